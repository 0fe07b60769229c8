//! Durable record of player actions
//!
//! The session produces [`ActionRecord`]s; the dispatch loop hands them to an
//! [`ActionLogger`] before any outbound event is queued. The logger is
//! best-effort: each append runs on the blocking pool under a timeout, a
//! failed or stalled append is retried a bounded number of times, and a
//! record that never lands is counted without holding back delivery.

use crate::error::ActionLogError;
use log::{debug, error, warn};
use shared::LevelId;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

pub const CSV_COLUMNS: [&str; 5] = ["player_number", "type", "level", "timestamp", "details"];

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);
pub const DEFAULT_APPEND_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub player_id: String,
    pub action_type: &'static str,
    pub level: Option<LevelId>,
    pub timestamp_ms: u64,
    pub fields: Vec<(&'static str, String)>,
}

impl ActionRecord {
    pub fn new(
        player_id: impl Into<String>,
        action_type: &'static str,
        level: Option<LevelId>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            action_type,
            level,
            timestamp_ms,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: &'static str, value: impl ToString) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `key=value` pairs joined with `;`
    pub fn details(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Append-only destination for action records
///
/// Appends may block; the logger never calls them on the dispatch loop.
pub trait ActionSink: Send + 'static {
    fn append(&mut self, record: &ActionRecord) -> Result<(), ActionLogError>;
}

/// Appends one CSV row per record, writing the header when the file is new
pub struct CsvActionLog {
    writer: csv::Writer<File>,
}

impl CsvActionLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ActionLogError> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        if is_new {
            writer.write_record(CSV_COLUMNS)?;
            writer.flush()?;
        }

        debug!("Action log opened at {}", path.display());
        Ok(Self { writer })
    }
}

impl ActionSink for CsvActionLog {
    fn append(&mut self, record: &ActionRecord) -> Result<(), ActionLogError> {
        let level = record.level.map(|l| l.to_string()).unwrap_or_default();
        let timestamp = record.timestamp_ms.to_string();
        let details = record.details();

        self.writer.write_record([
            record.player_id.as_str(),
            record.action_type,
            level.as_str(),
            timestamp.as_str(),
            details.as_str(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory; clones share the same buffer
#[derive(Clone, Default)]
pub struct MemoryActionLog {
    records: Arc<Mutex<Vec<ActionRecord>>>,
}

impl MemoryActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ActionRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ActionSink for MemoryActionLog {
    fn append(&mut self, record: &ActionRecord) -> Result<(), ActionLogError> {
        self.records
            .lock()
            .map_err(|_| ActionLogError::Unavailable("memory log poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Discards every record
pub struct NullActionLog;

impl ActionSink for NullActionLog {
    fn append(&mut self, _record: &ActionRecord) -> Result<(), ActionLogError> {
        Ok(())
    }
}

/// Best-effort writer in front of an [`ActionSink`]
pub struct ActionLogger {
    sink: Arc<Mutex<Box<dyn ActionSink>>>,
    max_attempts: u32,
    retry_backoff: Duration,
    append_timeout: Duration,
    failures: Arc<AtomicU64>,
}

impl ActionLogger {
    pub fn new(sink: Box<dyn ActionSink>) -> Self {
        Self::with_retry(sink, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF)
    }

    pub fn with_retry(sink: Box<dyn ActionSink>, max_attempts: u32, retry_backoff: Duration) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            max_attempts: max_attempts.max(1),
            retry_backoff,
            append_timeout: DEFAULT_APPEND_TIMEOUT,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Upper bound on a single append attempt
    pub fn with_append_timeout(mut self, append_timeout: Duration) -> Self {
        self.append_timeout = append_timeout;
        self
    }

    /// Appends a record, retrying on failure
    ///
    /// Returns false once every attempt failed or timed out; the failure is
    /// counted and logged, never propagated. Worst case the caller waits
    /// `max_attempts` timeouts plus the backoffs between them.
    pub async fn record(&self, record: &ActionRecord) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.attempt(record).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        "Action log append failed (attempt {}/{}): {}",
                        attempt, self.max_attempts, e
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
            }
        }

        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        error!(
            "Dropped {} record from {} after {} attempts ({} dropped so far)",
            record.action_type, record.player_id, self.max_attempts, failures
        );
        false
    }

    /// One append on the blocking pool, abandoned after `append_timeout`
    ///
    /// An abandoned append keeps the sink locked until it returns; attempts
    /// made meanwhile fail immediately instead of queueing behind it.
    async fn attempt(&self, record: &ActionRecord) -> Result<(), ActionLogError> {
        let sink = Arc::clone(&self.sink);
        let record = record.clone();

        let append = tokio::task::spawn_blocking(move || {
            let mut sink = match sink.try_lock() {
                Ok(sink) => sink,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    return Err(ActionLogError::Unavailable(
                        "previous append still in progress".to_string(),
                    ))
                }
            };
            sink.append(&record)
        });

        match tokio::time::timeout(self.append_timeout, append).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ActionLogError::Unavailable(format!("append task failed: {}", e))),
            Err(_) => Err(ActionLogError::TimedOut(self.append_timeout)),
        }
    }

    /// Number of records dropped after exhausting retries
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Shared view of the dropped-record counter
    pub fn failure_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.failures)
    }
}
