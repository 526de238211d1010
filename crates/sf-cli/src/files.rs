use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use sf_compiler::ParsedList;
use sf_core::types::CompiledRule;

/// Read a text file, replacing invalid UTF-8 so one bad line does not void
/// the rest of a filter list.
pub fn read_text(path: &Path) -> Result<String, String> {
    let bytes = fs::read(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| format!("Failed to serialize '{}': {}", path.display(), e))?;
    fs::write(path, bytes).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

/// List id derived from a filter list path, e.g. `lists/easylist.txt` -> `easylist`.
pub fn list_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "list".to_string())
}

/// Read compiled rules written by `compile` (a listId -> compiled list map)
/// or a bare rule array. Lists come back sorted by id.
pub fn read_compiled_rules(path: &Path) -> Result<Vec<(String, Vec<CompiledRule>)>, String> {
    let text = read_text(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid JSON in '{}': {}", path.display(), e))?;

    if value.is_array() {
        let rules: Vec<CompiledRule> = serde_json::from_value(value)
            .map_err(|e| format!("Invalid rule array in '{}': {}", path.display(), e))?;
        return Ok(vec![(list_id_for(path), rules)]);
    }

    let lists: BTreeMap<String, ParsedList> = serde_json::from_value(value)
        .map_err(|e| format!("Invalid compiled lists in '{}': {}", path.display(), e))?;
    Ok(lists.into_iter().map(|(id, list)| (id, list.rules)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_list_id_from_file_stem() {
        assert_eq!(list_id_for(Path::new("lists/easylist.txt")), "easylist");
        assert_eq!(list_id_for(Path::new("privacy")), "privacy");
    }

    #[test]
    fn invalid_utf8_only_degrades_its_own_line() {
        let dir = std::env::temp_dir().join(format!("sf-cli-utf8-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join("latin1.txt");
        fs::write(&path, b"||ads.example.com^\n||bad\xFF.example.com^\n||cdn.example.net^\n").expect("write");

        let text = read_text(&path).expect("lossy read");
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).expect("second line").contains('\u{FFFD}'));

        let parsed = sf_compiler::FilterParser::new().parse_filter_list(&text, "latin1");
        let filters: Vec<&str> = parsed.rules.iter().map(|r| r.condition.url_filter.as_str()).collect();
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0], "ads.example.com");
        assert_eq!(filters[2], "cdn.example.net");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn reads_both_compiled_layouts() {
        let dir = std::env::temp_dir().join(format!("sf-cli-files-{}", std::process::id()));
        let mut parser = sf_compiler::FilterParser::new();
        let parsed = parser.parse_filter_list("||ads.example.com^\n||cdn.example.net^$script", "easylist");

        let array_path = dir.join("rules.json");
        write_json(&array_path, &parsed.rules).expect("write array");
        let lists = read_compiled_rules(&array_path).expect("read array");
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].0, "rules");
        assert_eq!(lists[0].1.len(), 2);

        let mut map = BTreeMap::new();
        map.insert("easylist".to_string(), parsed);
        let map_path = dir.join("compiled.json");
        write_json(&map_path, &map).expect("write map");
        let lists = read_compiled_rules(&map_path).expect("read map");
        assert_eq!(lists[0].0, "easylist");
        assert_eq!(lists[0].1[1].id, 1001);

        let _ = fs::remove_dir_all(&dir);
    }
}
