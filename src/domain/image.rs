// Persisted image domain model
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Handle to an image already written to blob storage. The store keeps at
/// most one of these as the "latest" reference; the files themselves stay
/// on storage, addressed by filename.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
}

impl ImageRecord {
    pub fn new(filename: String, size: u64) -> Self {
        Self {
            filename,
            timestamp: Utc::now(),
            size,
        }
    }
}
