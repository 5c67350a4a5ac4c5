//! Probe + log as one step.
//!
//! Every trigger (button, client timer, server timer) goes through
//! [`TestRunner::run`], which holds a single-flight lock so at most one probe
//! is in progress per process. A trigger that arrives while a probe is running
//! waits for it and then performs its own probe.

use std::sync::Arc;

use chrono::{Local, Timelike};
use tokio::sync::Mutex;

use crate::probe::Probe;
use crate::storage::{LogRecord, LogStore, StorageError, TestMode};

/// Runs a probe and appends its outcome to the log.
#[derive(Clone)]
pub struct TestRunner {
    probe: Arc<dyn Probe>,
    store: LogStore,
    in_flight: Arc<Mutex<()>>,
}

impl TestRunner {
    pub fn new(probe: Arc<dyn Probe>, store: LogStore) -> Self {
        Self {
            probe,
            store,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn target(&self) -> &str {
        self.probe.target()
    }

    /// Probe the target once and append exactly one record.
    ///
    /// # Errors
    /// Returns `StorageError` if the record could not be written. Network
    /// failures are not errors; they are logged as failed records.
    pub async fn run(&self, mode: TestMode) -> Result<LogRecord, StorageError> {
        let _guard = self.in_flight.lock().await;

        let outcome = self.probe.probe().await;
        let now = Local::now().naive_local();
        let record = LogRecord {
            timestamp: now.with_nanosecond(0).unwrap_or(now),
            mode,
            status: outcome.status,
            latency_ms: outcome.latency_ms,
            detail: outcome.detail,
        };

        self.store.append(record.clone()).await?;

        tracing::info!(
            target_url = %self.probe.target(),
            mode = %record.mode,
            status = %record.status,
            latency_ms = ?record.latency_ms,
            "Connectivity test recorded"
        );
        Ok(record)
    }
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("target", &self.probe.target())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use crate::storage::ProbeStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    /// Probe that sleeps and tracks how many calls overlap.
    struct SlowProbe {
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Probe for SlowProbe {
        fn target(&self) -> &str {
            "stub://slow"
        }

        async fn probe(&self) -> ProbeOutcome {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            ProbeOutcome::failure(None, "unreachable")
        }
    }

    #[tokio::test]
    async fn test_run_appends_one_record_per_probe() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log.txt"));
        let probe = Arc::new(SlowProbe {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let runner = TestRunner::new(probe, store.clone());

        let record = runner.run(TestMode::Manual).await.unwrap();
        assert_eq!(record.mode, TestMode::Manual);
        assert_eq!(record.status, ProbeStatus::Failed);
        assert_eq!(record.detail, "unreachable");

        runner.run(TestMode::Auto).await.unwrap();
        let records = store.read_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record);
        assert_eq!(records[1].mode, TestMode::Auto);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_are_serialized() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log.txt"));
        let probe = Arc::new(SlowProbe {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let runner = TestRunner::new(probe.clone(), store.clone());

        let a = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run(TestMode::Manual).await }
        });
        let b = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run(TestMode::Auto).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(probe.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(store.read_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for appending.
        let store = LogStore::new(dir.path());
        let probe = Arc::new(SlowProbe {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let runner = TestRunner::new(probe, store);

        assert!(runner.run(TestMode::Manual).await.is_err());
    }
}
