// Bus listener - MQTT subscription and the per-message ingestion pipeline
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::broadcaster::Broadcaster;
use crate::application::image_persister::ImagePersister;
use crate::application::normalizer;
use crate::application::state_store::StateStore;
use crate::domain::event::RelayEvent;
use crate::domain::log::LogLevel;
use crate::error::{RelayError, Result};
use crate::infrastructure::config::BusSettings;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// Subscribes to the configured topics and drives every inbound message
/// through decode → normalize → merge → broadcast. Per-message failures are
/// logged and isolated; a bad message never affects the next one, and a
/// dead bus never crashes the relay.
pub struct MqttListener {
    settings: BusSettings,
    store: Arc<StateStore>,
    broadcaster: Arc<Broadcaster>,
    persister: Arc<ImagePersister>,
    state: Mutex<ConnectionState>,
}

impl MqttListener {
    pub fn new(
        settings: BusSettings,
        store: Arc<StateStore>,
        broadcaster: Arc<Broadcaster>,
        persister: Arc<ImagePersister>,
    ) -> Self {
        Self {
            settings,
            store,
            broadcaster,
            persister,
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Drive the connection until the process stops. Connection errors
    /// drop the state back to Disconnected and polling resumes after a
    /// fixed delay; the event loop re-dials on the next poll.
    pub async fn run(&self) {
        let (client, mut eventloop) = match self.client() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "bus listener not started");
                return;
            }
        };
        self.set_state(ConnectionState::Connecting);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(
                        host = %self.settings.host,
                        port = self.settings.port,
                        "connected to telemetry bus"
                    );
                    for topic in &self.settings.topics {
                        if let Err(e) = client.subscribe(topic.clone(), QoS::AtMostOnce).await {
                            warn!(topic, error = %e, "subscribe failed");
                        }
                    }
                    self.set_state(ConnectionState::Subscribed);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.handle_message(&publish.topic, &publish.payload).await;
                }
                Ok(_) => {}
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    let err = RelayError::BusConnection(e.to_string());
                    warn!(error = %err, "bus connection lost, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    self.set_state(ConnectionState::Connecting);
                }
            }
        }
    }

    fn client(&self) -> Result<(AsyncClient, EventLoop)> {
        let mut options = MqttOptions::new(
            self.settings.client_id.clone(),
            self.settings.host.clone(),
            self.settings.port,
        );
        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(user), Some(pass)) = (&self.settings.username, &self.settings.password) {
            options.set_credentials(user.clone(), pass.clone());
        }
        if let Some(ca_file) = &self.settings.ca_file {
            let ca = std::fs::read(ca_file).map_err(|e| {
                RelayError::BusConnection(format!("cannot read CA bundle {ca_file}: {e}"))
            })?;
            options.set_transport(Transport::Tls(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth: None,
            }));
        }
        Ok(AsyncClient::new(options, 64))
    }

    /// Process one inbound message. Emits exactly one `Telemetry` event,
    /// plus a distinct `ImageUpdated` when the message carried an image.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) {
        let text = String::from_utf8_lossy(payload);
        // Unparseable payloads stay raw strings: not mergeable, still
        // visible to viewers and the log path.
        let value: Value =
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()));
        debug!(topic, "bus message received");

        let patch = normalizer::normalize(topic, &value);
        let status = (!patch.is_empty()).then(|| self.store.merge_status(&patch));

        if self.is_image_topic(topic) {
            if let Some(encoded) = value.get("image").and_then(Value::as_str) {
                let hint = value.get("filename").and_then(Value::as_str);
                match self.persister.persist(encoded, hint).await {
                    Ok(record) => {
                        self.store.set_latest_image(record.clone());
                        self.broadcaster
                            .broadcast(RelayEvent::ImageUpdated { image: record });
                    }
                    Err(e) => {
                        self.store.append_log(
                            LogLevel::Error,
                            format!("[{topic}] failed to process image: {e}"),
                        );
                    }
                }
            }
        }

        let log = extract_log(&value).map(|(level, message)| {
            self.store
                .append_log(level, format!("[{topic}] {message}"))
        });

        self.broadcaster.broadcast(RelayEvent::Telemetry {
            topic: topic.to_string(),
            payload: value,
            status,
            log,
        });
    }

    fn is_image_topic(&self, topic: &str) -> bool {
        self.settings.image_topics.iter().any(|t| t == topic)
    }
}

/// Human-readable log carried inline in a payload: a `log` (preferred) or
/// `message` string field, with an optional `level`.
fn extract_log(value: &Value) -> Option<(LogLevel, String)> {
    let map = value.as_object()?;
    let message = map
        .get("log")
        .or_else(|| map.get("message"))
        .and_then(Value::as_str)?;
    let level = LogLevel::parse(map.get("level").and_then(Value::as_str));
    Some((level, message.to_string()))
}
