// Infrastructure layer - external collaborators and configuration
pub mod config;
pub mod fs_blob_store;
pub mod mqtt_listener;
