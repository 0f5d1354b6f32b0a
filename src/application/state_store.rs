// Canonical state store - the single shared mutable resource
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::image::ImageRecord;
use crate::domain::log::{LogEntry, LogLevel};
use crate::domain::status::{StatusPatch, StatusRecord};

/// Ring capacity of the mission log. One entry is evicted per append once
/// the ring is full.
pub const LOG_CAPACITY: usize = 1000;

/// Size of the externally exposed tail of the log.
pub const RECENT_LOG_WINDOW: usize = 100;

/// Point-in-time read of the store.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub status: StatusRecord,
    pub latest_image: Option<ImageRecord>,
    pub recent_logs: Vec<LogEntry>,
}

struct Inner {
    status: StatusRecord,
    latest_image: Option<ImageRecord>,
    logs: VecDeque<LogEntry>,
}

/// Holds current status, the latest image handle, and the mission log ring
/// behind one mutex. State is process-lifetime only; nothing survives a
/// restart, and that is accepted behavior. The lock is never held across
/// an await point - all blob I/O happens before the handle is registered.
pub struct StateStore {
    inner: Mutex<Inner>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: StatusRecord::default(),
                latest_image: None,
                logs: VecDeque::with_capacity(RECENT_LOG_WINDOW),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply every present field of the patch, stamp `last_update` when at
    /// least one field applied, and return the full updated record. Atomic
    /// with respect to concurrent callers.
    pub fn merge_status(&self, patch: &StatusPatch) -> StatusRecord {
        let mut inner = self.lock();
        if inner.status.apply(patch) {
            inner.status.last_update = Utc::now();
        }
        inner.status.clone()
    }

    /// Replace the latest-image reference. The caller must have finished
    /// writing the blob before registering the handle here.
    pub fn set_latest_image(&self, record: ImageRecord) {
        self.lock().latest_image = Some(record);
    }

    /// Append under the same locking discipline as status mutation, trim to
    /// capacity, and return the entry actually stored. The entry is also
    /// mirrored to the process log sink at its level.
    pub fn append_log(&self, level: LogLevel, message: String) -> LogEntry {
        let entry = LogEntry::new(level, message);
        match entry.level {
            LogLevel::Info => info!("{}", entry.message),
            LogLevel::Warning => warn!("{}", entry.message),
            LogLevel::Error => error!("{}", entry.message),
        }
        let mut inner = self.lock();
        inner.logs.push_back(entry.clone());
        if inner.logs.len() > LOG_CAPACITY {
            inner.logs.pop_front();
        }
        entry
    }

    pub fn clear_logs(&self) {
        self.lock().logs.clear();
    }

    /// Consistent point-in-time copy of status, latest image, and the last
    /// [`RECENT_LOG_WINDOW`] log entries. The contract only requires each
    /// section to be individually atomic; taking the one store lock makes
    /// the snapshot fully consistent across all three as a side effect.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        let skip = inner.logs.len().saturating_sub(RECENT_LOG_WINDOW);
        Snapshot {
            status: inner.status.clone(),
            latest_image: inner.latest_image.clone(),
            recent_logs: inner.logs.iter().skip(skip).cloned().collect(),
        }
    }

    #[cfg(test)]
    fn log_len(&self) -> usize {
        self.lock().logs.len()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
