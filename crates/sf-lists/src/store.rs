use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Key-value persistence for list metadata and compiled rules.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write several keys in one operation.
    async fn set(&self, items: Vec<(String, Value)>) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.items.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    async fn set(&self, items: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut guard = self.items.lock().unwrap_or_else(|e| e.into_inner());
        guard.extend(items);
        Ok(())
    }
}

/// Stores every key in one JSON object on disk.
///
/// Writes go to a sibling temp file that is renamed over the original, so a
/// crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StoreError::Io { path: self.path.clone(), source }),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut all = self.read_all().await?;
        Ok(all.remove(key))
    }

    async fn set(&self, items: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut all = self.read_all().await?;
        all.extend(items);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }

        let bytes = serde_json::to_vec(&all)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|source| StoreError::Io { path: tmp_path.clone(), source })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| StoreError::Io { path: self.path.clone(), source })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn memory_store_merges_keys() {
        let store = MemoryStore::new();
        store.set(vec![("a".into(), json!(1)), ("b".into(), json!(2))]).await.expect("set");
        store.set(vec![("b".into(), json!(3))]).await.expect("set");

        assert_eq!(store.get("a").await.expect("get"), Some(json!(1)));
        assert_eq!(store.get("b").await.expect("get"), Some(json!(3)));
        assert_eq!(store.get("c").await.expect("get"), None);
    }

    #[tokio::test]
    async fn file_store_round_trips_and_tolerates_missing_file() {
        let dir = std::env::temp_dir().join(format!("sf-store-{}", std::process::id()));
        let path = dir.join("cache.json");
        let _ = tokio::fs::remove_file(&path).await;

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get("filterListsCache").await.expect("get"), None);

        store
            .set(vec![("filterListsCache".into(), json!({"easylist": {"ruleCount": 3}}))])
            .await
            .expect("set");
        store.set(vec![("other".into(), json!([1, 2]))]).await.expect("set");

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.get("filterListsCache").await.expect("get"),
            Some(json!({"easylist": {"ruleCount": 3}}))
        );
        assert_eq!(reopened.get("other").await.expect("get"), Some(json!([1, 2])));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_content() {
        let path = std::env::temp_dir().join(format!("sf-store-corrupt-{}.json", std::process::id()));
        tokio::fs::write(&path, b"not json").await.expect("write");

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get("x").await, Err(StoreError::Json(_))));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
