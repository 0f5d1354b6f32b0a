//! Drone telemetry relay core.
//!
//! Ingests loosely-structured status/image/log messages from a vehicle over
//! an MQTT bus, reconciles them into one canonical in-memory state, and
//! fans change notifications out to connected viewers. The surrounding web
//! layer consumes [`application::relay_service::RelayService`] for its
//! query/update API and [`application::broadcaster::Broadcaster`] for its
//! live-update transport.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
