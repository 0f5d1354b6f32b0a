// Relay service - the query/update API the web layer calls
use std::sync::Arc;

use tokio_stream::wrappers::BroadcastStream;

use crate::application::blob_store::BlobStore;
use crate::application::broadcaster::{Broadcaster, ViewerSession};
use crate::application::image_persister::ImagePersister;
use crate::application::state_store::{Snapshot, StateStore};
use crate::domain::event::RelayEvent;
use crate::domain::image::ImageRecord;
use crate::domain::log::{LogEntry, LogLevel};
use crate::domain::status::{StatusPatch, StatusRecord};
use crate::error::{RelayError, Result};

/// Facade over the state store, image persister, and broadcaster. The bus
/// listener and this direct API share `StateStore::merge_status` as the one
/// merge path; this type adds caller-facing validation and the broadcast
/// side of each operation.
#[derive(Clone)]
pub struct RelayService {
    store: Arc<StateStore>,
    broadcaster: Arc<Broadcaster>,
    persister: Arc<ImagePersister>,
    blobs: Arc<dyn BlobStore>,
}

impl RelayService {
    pub fn new(
        store: Arc<StateStore>,
        broadcaster: Arc<Broadcaster>,
        persister: Arc<ImagePersister>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            persister,
            blobs,
        }
    }

    /// Direct status push. A patch with no recognized fields is rejected
    /// before anything is merged.
    pub fn merge_status(&self, patch: StatusPatch) -> Result<StatusRecord> {
        if patch.is_empty() {
            return Err(RelayError::Validation(
                "status push carries no recognized fields".to_string(),
            ));
        }
        let status = self.store.merge_status(&patch);
        self.broadcaster.broadcast(RelayEvent::StatusMerged {
            status: status.clone(),
        });
        Ok(status)
    }

    pub fn get_snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn append_log(&self, level: LogLevel, message: String) -> LogEntry {
        let entry = self.store.append_log(level, message);
        self.broadcaster.broadcast(RelayEvent::LogAppended {
            entry: entry.clone(),
        });
        entry
    }

    pub fn clear_logs(&self) {
        self.store.clear_logs();
        self.broadcaster.broadcast(RelayEvent::LogsCleared);
    }

    /// Persist an embedded image and publish it as the latest. The blob is
    /// fully written before the latest-image reference moves; on any
    /// failure the previous reference stays untouched.
    pub async fn persist_image(&self, encoded: &str, hint: Option<&str>) -> Result<ImageRecord> {
        let record = self.persister.persist(encoded, hint).await?;
        self.store.set_latest_image(record.clone());
        self.broadcaster.broadcast(RelayEvent::ImageUpdated {
            image: record.clone(),
        });
        Ok(record)
    }

    /// All persisted image names, newest first.
    pub async fn list_images(&self) -> Result<Vec<String>> {
        self.blobs.list().await
    }

    /// Clear the image gallery on storage. The in-memory latest reference
    /// stays until the next persist replaces it.
    pub async fn clear_images(&self) -> Result<()> {
        self.blobs.delete_all().await?;
        self.append_log(LogLevel::Info, "Gallery cleared".to_string());
        Ok(())
    }

    /// Connect a viewer: the returned session carries a snapshot taken
    /// after subscribing, so no event between snapshot and stream is lost.
    pub fn viewer_connect(&self) -> ViewerSession {
        self.broadcaster.viewer_connect(|| self.store.snapshot())
    }

    pub fn viewer_disconnect(&self, id: u64) {
        self.broadcaster.viewer_disconnect(id);
    }

    /// Event stream for the web layer's live-update transport.
    pub fn subscribe(&self) -> BroadcastStream<RelayEvent> {
        self.broadcaster.subscribe()
    }
}
