// Domain layer - Core data model
pub mod event;
pub mod image;
pub mod log;
pub mod status;
