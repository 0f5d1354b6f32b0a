use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub bus: BusSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BusSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topics the listener subscribes to.
    pub topics: Vec<String>,
    /// Subset of topics whose payloads may carry an embedded image.
    pub image_topics: Vec<String>,
    /// PEM CA bundle; when set the connection uses TLS.
    pub ca_file: Option<String>,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 1883,
            client_id: "drone-relay".to_string(),
            username: None,
            password: None,
            topics: vec![
                "drone/status".to_string(),
                "drone/telemetry".to_string(),
                "drone/battery".to_string(),
                "drone/log".to_string(),
                "drone/image".to_string(),
            ],
            image_topics: vec!["drone/image".to_string()],
            ca_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub image_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            image_dir: "data/images".to_string(),
        }
    }
}

/// Read `config/relay.toml` (optional) with `RELAY__`-prefixed environment
/// overrides; every key has a default so a bare deployment starts.
pub fn load_relay_config() -> anyhow::Result<RelayConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/relay").required(false))
        .add_source(config::Environment::with_prefix("RELAY").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_key() {
        let settings = config::Config::builder().build().unwrap();
        let cfg: RelayConfig = settings.try_deserialize().unwrap();

        assert!(cfg.bus.enabled);
        assert_eq!(cfg.bus.port, 1883);
        assert!(cfg.bus.topics.contains(&"drone/battery".to_string()));
        assert_eq!(cfg.bus.image_topics, vec!["drone/image"]);
        assert_eq!(cfg.storage.image_dir, "data/images");
    }
}
