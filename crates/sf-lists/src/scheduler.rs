//! Periodic and on-demand refresh of the filter lists.

use std::time::Duration;

use log::{info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::registry::{ListRegistry, ToggleTarget};
use crate::status::RegistryStatus;

#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a refresh cycle now; `force` skips conditional requests.
    Refresh { force: bool },
    /// Enable or disable lists; replies with how many lists were covered.
    Toggle {
        target: ToggleTarget,
        enabled: bool,
        reply: oneshot::Sender<usize>,
    },
    Status { reply: oneshot::Sender<RegistryStatus> },
    Shutdown,
}

/// Sends commands to a running [`UpdateScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Returns false once the scheduler has stopped.
    pub async fn refresh_now(&self, force: bool) -> bool {
        self.tx.send(SchedulerCommand::Refresh { force }).await.is_ok()
    }

    /// `None` once the scheduler has stopped.
    pub async fn toggle(&self, target: ToggleTarget, enabled: bool) -> Option<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SchedulerCommand::Toggle { target, enabled, reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn status(&self) -> Option<RegistryStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SchedulerCommand::Status { reply }).await.ok()?;
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        if self.tx.send(SchedulerCommand::Shutdown).await.is_err() {
            warn!("Scheduler already stopped");
        }
    }
}

/// Owns the registry and drives its refresh cycles.
///
/// Cycles never overlap: a manual request that arrives during a cycle waits
/// for it to finish. Toggles and status requests are served between cycles.
pub struct UpdateScheduler {
    registry: ListRegistry,
    period: Duration,
    commands: mpsc::Receiver<SchedulerCommand>,
}

impl UpdateScheduler {
    pub fn new(registry: ListRegistry, period: Duration) -> (Self, SchedulerHandle) {
        let (tx, commands) = mpsc::channel(8);
        let scheduler = Self {
            registry,
            period,
            commands,
        };
        (scheduler, SchedulerHandle { tx })
    }

    /// Run until shut down or every handle is dropped, then hand the
    /// registry back.
    pub async fn run(mut self) -> ListRegistry {
        // First periodic cycle one full period after start.
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Update scheduler started, every {}s", self.period.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => self.cycle(false).await,
                command = self.commands.recv() => match command {
                    Some(SchedulerCommand::Refresh { force }) => {
                        info!("Manual refresh requested{}", if force { " (forced)" } else { "" });
                        self.cycle(force).await;
                    }
                    Some(SchedulerCommand::Toggle { target, enabled, reply }) => {
                        let count = self.registry.toggle(&target, enabled).await;
                        let _ = reply.send(count);
                    }
                    Some(SchedulerCommand::Status { reply }) => {
                        let _ = reply.send(self.registry.status());
                    }
                    Some(SchedulerCommand::Shutdown) | None => break,
                },
            }
        }

        info!("Update scheduler stopped");
        self.registry
    }

    /// Pick up toggles other processes saved to the store, then refresh.
    async fn cycle(&mut self, force: bool) {
        if let Err(e) = self.registry.sync_enabled().await {
            warn!("Failed to read list state from the store: {}", e);
        }
        self.registry.refresh_all(force).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::config::Settings;
    use crate::engine::MemoryEngine;
    use crate::error::FetchError;
    use crate::fetch::{FetchOutcome, SourceFetcher};
    use crate::manifest::Manifest;
    use crate::store::MemoryStore;

    const MANIFEST: &str = r#"{"lists":[{
        "id":"easylist","title":"EasyList","category":"ads","enabledByDefault":true,
        "sources":[{"title":"EasyList","url":"https://lists.example/easylist.txt"}]
    }]}"#;

    /// Always serves the same body and ETag, honouring If-None-Match.
    #[derive(Default)]
    struct RecordingFetcher {
        requests: Mutex<Vec<Option<String>>>,
    }

    impl RecordingFetcher {
        fn requests(&self) -> Vec<Option<String>> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl SourceFetcher for RecordingFetcher {
        async fn fetch(&self, _url: &str, etag: Option<&str>) -> Result<FetchOutcome, FetchError> {
            self.requests.lock().expect("requests lock").push(etag.map(str::to_string));
            if etag == Some("\"v1\"") {
                return Ok(FetchOutcome::NotModified);
            }
            Ok(FetchOutcome::Fetched {
                body: "||ads.example.com^\n".to_string(),
                etag: Some("\"v1\"".to_string()),
            })
        }
    }

    fn registry(fetcher: Arc<RecordingFetcher>) -> ListRegistry {
        registry_on(fetcher, Arc::new(MemoryStore::new()), Arc::new(MemoryEngine::new()))
    }

    fn registry_on(fetcher: Arc<RecordingFetcher>, store: Arc<MemoryStore>, engine: Arc<MemoryEngine>) -> ListRegistry {
        ListRegistry::new(
            Manifest::from_json(MANIFEST).expect("manifest"),
            &Settings::default(),
            fetcher,
            store,
            engine,
        )
    }

    const PERIOD: Duration = Duration::from_secs(4 * 60 * 60);

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_full_period() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let (scheduler, handle) = UpdateScheduler::new(registry(fetcher.clone()), PERIOD);

        let driver = async {
            tokio::time::sleep(PERIOD - Duration::from_secs(60)).await;
            assert!(fetcher.requests().is_empty());

            tokio::time::sleep(Duration::from_secs(120)).await;
            assert_eq!(fetcher.requests(), vec![None]);

            tokio::time::sleep(PERIOD).await;
            assert_eq!(fetcher.requests(), vec![None, Some("\"v1\"".to_string())]);

            handle.shutdown().await;
        };

        let (registry, ()) = tokio::join!(scheduler.run(), driver);
        assert_eq!(registry.list("easylist").expect("easylist").rule_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_can_force_a_full_download() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let (scheduler, handle) = UpdateScheduler::new(registry(fetcher.clone()), PERIOD);

        let driver = async {
            assert!(handle.refresh_now(false).await);
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(handle.refresh_now(false).await);
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(handle.refresh_now(true).await);
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.shutdown().await;
        };

        let (registry, ()) = tokio::join!(scheduler.run(), driver);
        assert_eq!(fetcher.requests(), vec![None, Some("\"v1\"".to_string()), None]);
        // The forced cycle recompiled the list with fresh ids.
        assert_eq!(registry.next_rule_id(), 1002);
    }

    #[tokio::test]
    async fn stops_when_every_handle_is_dropped() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let (scheduler, handle) = UpdateScheduler::new(registry(fetcher.clone()), PERIOD);
        drop(handle);

        let registry = scheduler.run().await;
        assert!(fetcher.requests().is_empty());
        assert_eq!(registry.list("easylist").expect("easylist").rule_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn serves_toggles_and_status_while_running() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let engine = Arc::new(MemoryEngine::new());
        let mut registry = registry_on(fetcher.clone(), Arc::new(MemoryStore::new()), engine.clone());
        registry.initialize().await;
        let (scheduler, handle) = UpdateScheduler::new(registry, PERIOD);

        let driver = async {
            let status = handle.status().await.expect("status");
            assert_eq!(status.summary.enabled_lists, 1);
            assert_eq!(status.summary.total_rules, 1);

            let easylist = ToggleTarget::List("easylist".to_string());
            assert_eq!(handle.toggle(easylist, false).await, Some(1));
            assert!(engine.rules().is_empty());
            let nothing = ToggleTarget::Category("nothing-here".to_string());
            assert_eq!(handle.toggle(nothing, true).await, Some(0));

            let status = handle.status().await.expect("status");
            assert_eq!(status.summary.enabled_lists, 0);
            handle.shutdown().await;
        };

        let (registry, ()) = tokio::join!(scheduler.run(), driver);
        assert!(!registry.list("easylist").expect("easylist").enabled);
        assert!(handle.status().await.is_none());
        assert_eq!(fetcher.requests(), vec![None]);
    }

    #[tokio::test(start_paused = true)]
    async fn next_cycle_honours_a_toggle_saved_by_another_process() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(MemoryEngine::new());
        let mut watcher = registry_on(fetcher.clone(), store.clone(), engine.clone());
        watcher.initialize().await;
        let (scheduler, handle) = UpdateScheduler::new(watcher, PERIOD);

        let driver = async {
            let mut toggler = registry_on(fetcher.clone(), store.clone(), engine.clone());
            toggler.load_cached().await.expect("load");
            assert!(toggler.toggle_list("easylist", false).await);

            tokio::time::sleep(PERIOD + Duration::from_secs(1)).await;
            handle.shutdown().await;
        };

        let (watcher, ()) = tokio::join!(scheduler.run(), driver);
        assert!(!watcher.list("easylist").expect("easylist").enabled);
        assert!(engine.rules().is_empty());
        // The disabled list was not fetched again by the periodic cycle.
        assert_eq!(fetcher.requests(), vec![None]);
        assert_eq!(store.snapshot()["filterListsCache"]["easylist"]["enabled"], false);
    }
}
