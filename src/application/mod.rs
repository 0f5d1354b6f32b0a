// Application layer - core relay logic
pub mod blob_store;
pub mod broadcaster;
pub mod image_persister;
pub mod normalizer;
pub mod relay_service;
pub mod state_store;
