//! Append-only log file.
//!
//! Single-writer pattern: every append takes the writer lock, writes one
//! complete line with a single `write_all` on an append-mode handle and syncs
//! it before returning. Readers only consume newline-terminated lines, so a
//! write still in progress is never parsed as a record.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;

use crate::storage::StorageError;
use crate::storage::stats::AggregateStats;
use crate::storage::types::{LOG_HEADER, LogRecord};

/// Handle to the connectivity log file.
///
/// Cheap to clone; all clones share the same writer lock. Blocking methods
/// (`append_blocking`, `read_all_blocking`) do file I/O on the calling
/// thread; the async variants move it to the blocking pool.
#[derive(Debug, Clone)]
pub struct LogStore {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl LogStore {
    /// Create a store for the given path. The file is created lazily on first
    /// append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, writing the header first if the file is new.
    pub fn append_blocking(&self, record: &LogRecord) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(self.path.as_path())?;

        let mut buf = String::new();
        if file.metadata()?.len() == 0 {
            buf.push_str(LOG_HEADER);
            buf.push('\n');
        } else if !ends_with_newline(&mut file)? {
            // Terminate a torn line left by an interrupted write so this
            // record starts on its own line.
            tracing::warn!(path = %self.path.display(), "Log file ends mid-line, terminating it");
            buf.push('\n');
        }
        buf.push_str(&record.to_line());
        buf.push('\n');

        file.write_all(buf.as_bytes())?;
        file.sync_data()?;

        tracing::debug!(
            path = %self.path.display(),
            mode = %record.mode,
            status = %record.status,
            "Log record appended"
        );
        Ok(())
    }

    /// Read every well-formed record in file order.
    ///
    /// A missing file yields an empty list. Malformed lines and a trailing
    /// unterminated line are skipped.
    pub fn read_all_blocking(&self) -> Result<Vec<LogRecord>, StorageError> {
        let file = match File::open(self.path.as_path()) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut skipped = 0usize;
        let mut line = String::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 || !line.ends_with('\n') {
                break;
            }
            line_no += 1;

            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() || (line_no == 1 && trimmed == LOG_HEADER) {
                continue;
            }

            match LogRecord::parse_line(trimmed) {
                Some(record) => records.push(record),
                None => {
                    skipped += 1;
                    tracing::debug!(line_no, "Skipping malformed log line");
                }
            }
        }

        if skipped > 0 {
            tracing::debug!(
                path = %self.path.display(),
                skipped,
                parsed = records.len(),
                "Malformed log lines skipped"
            );
        }
        Ok(records)
    }

    /// Async wrapper around [`append_blocking`](Self::append_blocking).
    pub async fn append(&self, record: LogRecord) -> Result<(), StorageError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.append_blocking(&record)).await?
    }

    /// Async wrapper around [`read_all_blocking`](Self::read_all_blocking).
    pub async fn read_all(&self) -> Result<Vec<LogRecord>, StorageError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read_all_blocking()).await?
    }

    /// Read the log and aggregate it, keeping records at or after `since`.
    pub async fn aggregate(
        &self,
        since: Option<NaiveDateTime>,
    ) -> Result<AggregateStats, StorageError> {
        let records = self.read_all().await?;
        Ok(AggregateStats::from_records(&records, since))
    }
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ProbeStatus, TestMode};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn record(secs: u32, status: ProbeStatus, latency_ms: Option<f64>) -> LogRecord {
        LogRecord {
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(10, 0, secs)
                .unwrap(),
            mode: TestMode::Manual,
            status,
            latency_ms,
            detail: "HTTP 204".to_string(),
        }
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log.txt"));

        store
            .append_blocking(&record(1, ProbeStatus::Success, Some(10.0)))
            .unwrap();
        store
            .append_blocking(&record(2, ProbeStatus::Failed, None))
            .unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], LOG_HEADER);
        assert!(lines[1].contains("\tsuccess\t10.00\t"));
        assert!(lines[2].contains("\tfailed\t\t"));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_append_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("nested/deeper/log.txt"));
        store
            .append_blocking(&record(1, ProbeStatus::Success, Some(1.0)))
            .unwrap();
        assert_eq!(store.read_all_blocking().unwrap().len(), 1);
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("missing.txt"));
        assert!(store.read_all_blocking().unwrap().is_empty());
    }

    #[test]
    fn test_read_round_trips_in_append_order() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log.txt"));
        let written = vec![
            record(1, ProbeStatus::Success, Some(11.25)),
            record(2, ProbeStatus::Failed, None),
            record(3, ProbeStatus::Success, Some(9.5)),
        ];
        for r in &written {
            store.append_blocking(r).unwrap();
        }

        assert_eq!(store.read_all_blocking().unwrap(), written);
    }

    #[test]
    fn test_read_skips_malformed_and_partial_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(
            &path,
            format!(
                "{LOG_HEADER}\n\
                 2025-01-02 10:00:01\tmanual\tsuccess\t5.00\tHTTP 204\n\
                 this is not a record\n\
                 \n\
                 2025-01-02 10:00:02\tauto\tfailed\t\ttimeout\n\
                 2025-01-02 10:00:03\tauto\tsucc"
            ),
        )
        .unwrap();

        let records = LogStore::new(&path).read_all_blocking().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, ProbeStatus::Success);
        assert_eq!(records[1].mode, TestMode::Auto);
    }

    #[test]
    fn test_append_after_torn_line_starts_new_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, format!("{LOG_HEADER}\n2025-01-02 10:00:01\tauto\tsucc")).unwrap();

        let store = LogStore::new(&path);
        let appended = record(5, ProbeStatus::Success, Some(3.0));
        store.append_blocking(&appended).unwrap();

        assert_eq!(store.read_all_blocking().unwrap(), vec![appended]);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(LOG_HEADER).count(), 1);
        assert!(content.contains("\tsucc\n2025-01-02 10:00:05\t"));
    }

    #[tokio::test]
    async fn test_aggregate_excludes_malformed_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(
            &path,
            format!(
                "{LOG_HEADER}\n\
                 2025-01-02 10:00:01\tmanual\tsuccess\t5.00\tHTTP 204\n\
                 2025-01-02 10:00:02\tmanual\tsuccess\t7.00\tHTTP 204\n\
                 %%%% corrupted %%%%\n\
                 2025-01-02 10:00:03\tauto\tsuccess\t6.00\tHTTP 204\n\
                 2025-01-02 10:00:04\tauto\tfailed\t\ttimed out\n"
            ),
        )
        .unwrap();

        let stats = LogStore::new(&path).aggregate(None).await.unwrap();
        assert_eq!(stats.summary.success, 3);
        assert_eq!(stats.summary.failed, 1);
        assert_eq!(stats.summary.success_rate, 75.0);
        assert_eq!(stats.summary.avg_latency_ms, Some(6.0));
    }

    #[tokio::test]
    async fn test_aggregate_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "").unwrap();

        let stats = LogStore::new(&path).aggregate(None).await.unwrap();
        assert_eq!(stats, AggregateStats::default());
    }

    #[test]
    fn test_read_without_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "2025-01-02 10:00:01\tmanual\tsuccess\t5.00\tHTTP 204\n").unwrap();

        assert_eq!(LogStore::new(&path).read_all_blocking().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log.txt"));

        let mut tasks = Vec::new();
        for i in 0..20u32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .append(record(i % 60, ProbeStatus::Success, Some(f64::from(i))))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches(LOG_HEADER).count(), 1);
        assert_eq!(store.read_all().await.unwrap().len(), 20);
    }
}
