//! Server configuration, loaded from a TOML file.
//!
//! Every section is optional; anything left out keeps its default.
//!
//! ```toml
//! listen_addr = "0.0.0.0:3000"
//! questions_path = "questions.json"
//!
//! [engine]
//! countdown_secs = 3
//! deadline_grace_secs = 2
//!
//! [limits]
//! ping_interval_secs = 15
//! peer_timeout_secs = 45
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use battlequiz_room::EngineConfig;
use serde::Deserialize;

use crate::BattleQuizError;

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub questions_path: PathBuf,
    pub engine: EngineConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            questions_path: PathBuf::from("questions.json"),
            engine: EngineConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Dead-peer detection.
///
/// The server pings every connection on an interval. A peer that sends
/// nothing, not even a ping answer, for `peer_timeout_secs` is closed. A
/// player who is merely thinking still answers pings, so a long answer
/// window never trips this.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub ping_interval_secs: u64,
    pub peer_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 15,
            peer_timeout_secs: 45,
        }
    }
}

impl LimitsConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, BattleQuizError> {
        toml::from_str(text).map_err(|e| BattleQuizError::Config(e.to_string()))
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BattleQuizError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BattleQuizError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Rejects values the server cannot start with.
    pub fn validate(&self) -> Result<(), BattleQuizError> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(BattleQuizError::Config(format!(
                "listen_addr {:?} is not a socket address",
                self.listen_addr
            )));
        }
        if self.limits.ping_interval_secs == 0 {
            return Err(BattleQuizError::Config(
                "limits.ping_interval_secs must be > 0".to_string(),
            ));
        }
        if self.limits.peer_timeout_secs <= self.limits.ping_interval_secs {
            return Err(BattleQuizError::Config(
                "limits.peer_timeout_secs must be longer than limits.ping_interval_secs"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.limits.ping_interval(), Duration::from_secs(15));
        assert_eq!(config.limits.peer_timeout(), Duration::from_secs(45));
        assert_eq!(config.engine.countdown_secs, 3);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            listen_addr = "127.0.0.1:4000"

            [engine]
            countdown_secs = 5
            enforce_answer_deadline = false

            [limits]
            peer_timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:4000");
        assert_eq!(config.questions_path, PathBuf::from("questions.json"));
        assert_eq!(config.engine.countdown_secs, 5);
        assert!(!config.engine.enforce_answer_deadline);
        assert_eq!(config.engine.deadline_grace_secs, 2);
        assert_eq!(config.limits.peer_timeout_secs, 60);
        assert_eq!(config.limits.ping_interval_secs, 15);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ServerConfig::from_toml_str("listen_addr = ").unwrap_err();
        assert!(matches!(err, BattleQuizError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ServerConfig::load("/nonexistent/battlequiz.toml").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_validate() {
        assert!(ServerConfig::default().validate().is_ok());

        let bad_addr = ServerConfig {
            listen_addr: "not an address".into(),
            ..ServerConfig::default()
        };
        assert!(bad_addr.validate().is_err());

        let no_ping = ServerConfig {
            limits: LimitsConfig {
                ping_interval_secs: 0,
                peer_timeout_secs: 45,
            },
            ..ServerConfig::default()
        };
        assert!(no_ping.validate().is_err());

        // The timeout must leave room for at least one answered ping.
        let too_tight = ServerConfig {
            limits: LimitsConfig {
                ping_interval_secs: 30,
                peer_timeout_secs: 30,
            },
            ..ServerConfig::default()
        };
        assert!(too_tight.validate().is_err());
    }
}
