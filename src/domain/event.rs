// Events pushed to connected viewers
use serde::Serialize;
use serde_json::Value;

use crate::domain::image::ImageRecord;
use crate::domain::log::LogEntry;
use crate::domain::status::StatusRecord;

/// One broadcast notification. `Telemetry` is emitted exactly once per
/// inbound bus message; `ImageUpdated` is a distinct notification emitted
/// in addition when a message carried an image. The remaining variants
/// cover the direct API path.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    Telemetry {
        topic: String,
        payload: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<StatusRecord>,
        #[serde(skip_serializing_if = "Option::is_none")]
        log: Option<LogEntry>,
    },
    StatusMerged {
        status: StatusRecord,
    },
    LogAppended {
        entry: LogEntry,
    },
    LogsCleared,
    ImageUpdated {
        image: ImageRecord,
    },
}
