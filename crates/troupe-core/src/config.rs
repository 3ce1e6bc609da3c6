//! Registry configuration
//!
//! Parsed from an optional `registry.json`. The `hosts` block is advisory:
//! it exists for operators that restart managers out-of-band and is never
//! consulted by the lookup path.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{HEARTBEAT_CHECK_INTERVAL_MS, HEARTBEAT_TIMEOUT_MS};
use crate::error::{Error, Result};

/// Registry service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Endpoint the registry binds, `<scheme>://<host>:<port>`
    #[serde(default = "default_registry_endpoint")]
    pub registry_endpoint: String,

    /// Seconds without a heartbeat before a manager is reported offline
    #[serde(default = "default_heartbeat_timeout_s")]
    pub heartbeat_timeout_s: f64,

    /// Seconds between liveness sweeps
    #[serde(default = "default_heartbeat_check_interval_s")]
    pub heartbeat_check_interval_s: f64,

    /// Advisory host inventory for out-of-band restart tooling
    #[serde(default)]
    pub hosts: HashMap<String, HostConfig>,
}

/// Advisory description of a host that runs managers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// SSH destination, e.g. `user@192.168.1.10`
    pub ssh: String,

    /// Managers expected on this host, by manager id
    #[serde(default)]
    pub managers: HashMap<String, ManagerConfig>,
}

/// Advisory description of one manager process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Service unit name used by restart tooling
    pub service: String,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_registry_endpoint() -> String {
    "tcp://0.0.0.0:5555".to_string()
}

fn default_heartbeat_timeout_s() -> f64 {
    HEARTBEAT_TIMEOUT_MS as f64 / 1000.0
}

fn default_heartbeat_check_interval_s() -> f64 {
    HEARTBEAT_CHECK_INTERVAL_MS as f64 / 1000.0
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_endpoint: default_registry_endpoint(),
            heartbeat_timeout_s: default_heartbeat_timeout_s(),
            heartbeat_check_interval_s: default_heartbeat_check_interval_s(),
            hosts: HashMap::new(),
        }
    }
}

impl RegistryConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_configuration("config file", format!("{}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            Error::invalid_configuration("config file", format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.registry_endpoint.contains("://") {
            return Err(Error::invalid_configuration(
                "registry_endpoint",
                "must be in <scheme>://<host>:<port> format",
            ));
        }

        if self.heartbeat_timeout_s <= 0.0 {
            return Err(Error::invalid_configuration(
                "heartbeat_timeout_s",
                "must be positive",
            ));
        }

        if self.heartbeat_check_interval_s <= 0.0 {
            return Err(Error::invalid_configuration(
                "heartbeat_check_interval_s",
                "must be positive",
            ));
        }

        if self.heartbeat_check_interval_s > self.heartbeat_timeout_s {
            return Err(Error::invalid_configuration(
                "heartbeat_check_interval_s",
                "must not exceed heartbeat_timeout_s",
            ));
        }

        Ok(())
    }

    /// Heartbeat timeout as a duration
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_timeout_s)
    }

    /// Liveness sweep interval as a duration
    pub fn heartbeat_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_check_interval_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.registry_endpoint, "tcp://0.0.0.0:5555");
        assert_eq!(config.heartbeat_timeout(), Duration::from_secs(6));
        assert_eq!(config.heartbeat_check_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "registry_endpoint": "tcp://0.0.0.0:6000",
            "heartbeat_timeout_s": 10.0,
            "hosts": {
                "lab-1": {
                    "ssh": "ops@192.168.1.10",
                    "managers": {
                        "PongManager": {
                            "service": "pong.service",
                            "language": "rust",
                            "description": "pong host"
                        }
                    }
                }
            }
        }"#;

        let config: RegistryConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.registry_endpoint, "tcp://0.0.0.0:6000");
        assert_eq!(config.heartbeat_timeout_s, 10.0);
        // check interval falls back to its default
        assert_eq!(config.heartbeat_check_interval_s, 1.0);
        let host = &config.hosts["lab-1"];
        assert_eq!(host.ssh, "ops@192.168.1.10");
        assert_eq!(host.managers["PongManager"].service, "pong.service");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let json = r#"{"registry_endpoint": "tcp://0.0.0.0:5555", "future_field": 1}"#;
        let config: RegistryConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = RegistryConfig {
            registry_endpoint: "0.0.0.0:5555".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_check_interval_must_not_exceed_timeout() {
        let config = RegistryConfig {
            heartbeat_timeout_s: 1.0,
            heartbeat_check_interval_s: 2.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
