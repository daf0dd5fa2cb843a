//! Server configuration.
//!
//! Read from the TOML file named by `HOLDOUT_CONFIG`; every key is
//! optional. `HOLDOUT_BIND` overrides the bind address.
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//!
//! [game]
//! standard_round = 180
//! announcement_delay = 5
//!
//! [session]
//! idle_timeout = 30
//!
//! [cleanup]
//! interval = 60
//! finished_room_ttl = 600
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use holdout_room::GameConfig;
use holdout_store::{ReferenceData, StoreError};

pub const CONFIG_ENV: &str = "HOLDOUT_CONFIG";
pub const BIND_ENV: &str = "HOLDOUT_BIND";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("invalid reference data: {0}")]
    ReferenceData(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Largest inbound WebSocket frame, in bytes.
    pub max_frame_bytes: usize,
    pub game: GameConfig,
    pub session: SessionSettings,
    pub cleanup: CleanupSettings,
    pub logging: LoggingSettings,
    /// Deck file; the compiled-in deck is used when unset.
    pub reference_data: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_frame_bytes: 64 * 1024,
            game: GameConfig::default(),
            session: SessionSettings::default(),
            cleanup: CleanupSettings::default(),
            logging: LoggingSettings::default(),
            reference_data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// How long a new connection has to send `Hello`.
    #[serde(with = "secs")]
    pub handshake_timeout: Duration,
    /// Connections silent for this long are closed. Clients send
    /// `Heartbeat` to stay under it.
    #[serde(with = "secs")]
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    #[serde(with = "secs")]
    pub interval: Duration,
    /// Finished rooms are purged this long after the game ended.
    #[serde(with = "secs")]
    pub finished_room_ttl: Duration,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            finished_room_ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game.validate().map_err(ConfigError::Invalid)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `HOLDOUT_CONFIG` if set, else defaults, then applies
    /// `HOLDOUT_BIND`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if let Ok(bind) = std::env::var(BIND_ENV) {
            config.bind = bind;
        }
        Ok(config)
    }

    /// The configured deck, or the compiled-in one.
    pub fn load_reference_data(&self) -> Result<ReferenceData, ConfigError> {
        let Some(path) = &self.reference_data else {
            return Ok(ReferenceData::builtin());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(ReferenceData::from_toml_str(&text)?)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.session.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.cleanup.finished_room_ttl, Duration::from_secs(600));
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.game.min_players, 4);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:9000"

            [game]
            quick_round = 45
            announcement_delay = 2

            [session]
            idle_timeout = 10

            [logging]
            level = "debug,holdout_room=trace"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.game.quick_round, Duration::from_secs(45));
        assert_eq!(config.game.announcement_delay, Duration::from_secs(2));
        assert_eq!(config.game.standard_round, Duration::from_secs(180));
        assert_eq!(config.session.idle_timeout, Duration::from_secs(10));
        assert_eq!(config.session.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = ServerConfig::from_toml_str("[logging]\nformat = \"xml\"\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_min_players_below_four_is_rejected() {
        let err = ServerConfig::from_toml_str("[game]\nmin_players = 2\n");
        assert!(matches!(err, Err(ConfigError::Invalid(msg)) if msg.contains("min_players")));
    }

    #[test]
    fn test_zero_candidates_and_code_length_are_rejected() {
        let err = ServerConfig::from_toml_str("[game]\ncandidates_per_ballot = 0\n");
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
        let err = ServerConfig::from_toml_str("[game]\ncode_length = 0\n");
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_reference_file_is_read_error() {
        let config = ServerConfig {
            reference_data: Some(PathBuf::from("/nonexistent/deck.toml")),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.load_reference_data(),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_builtin_deck_when_unset() {
        let data = ServerConfig::default().load_reference_data().unwrap();
        assert!(!data.cards.is_empty());
    }
}
