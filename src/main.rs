// Main entry point - dependency injection and relay startup
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use drone_relay::application::blob_store::BlobStore;
use drone_relay::application::broadcaster::Broadcaster;
use drone_relay::application::image_persister::ImagePersister;
use drone_relay::application::relay_service::RelayService;
use drone_relay::application::state_store::StateStore;
use drone_relay::domain::log::LogLevel;
use drone_relay::infrastructure::config::load_relay_config;
use drone_relay::infrastructure::fs_blob_store::FsBlobStore;
use drone_relay::infrastructure::mqtt_listener::MqttListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_relay_config()?;

    // Image storage must exist and be writable; this is the only fatal
    // startup check.
    let blobs: Arc<dyn BlobStore> = Arc::new(
        FsBlobStore::new(&config.storage.image_dir)
            .await
            .with_context(|| {
                format!("cannot prepare image storage at {}", config.storage.image_dir)
            })?,
    );

    let store = Arc::new(StateStore::new());
    let broadcaster = Arc::new(Broadcaster::default());
    let persister = Arc::new(ImagePersister::new(blobs.clone()));
    let service = RelayService::new(store.clone(), broadcaster.clone(), persister.clone(), blobs);

    service.append_log(LogLevel::Info, "Drone telemetry relay started".to_string());

    if config.bus.enabled {
        let listener = MqttListener::new(config.bus.clone(), store, broadcaster, persister);
        tokio::spawn(async move { listener.run().await });
    } else {
        tracing::info!("bus listener disabled, serving direct API only");
    }

    tokio::signal::ctrl_c().await?;
    service.append_log(LogLevel::Info, "Drone telemetry relay stopping".to_string());

    Ok(())
}
