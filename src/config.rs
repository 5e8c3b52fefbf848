use crate::error::MembershipError;
use crate::node::Node;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Defaults
const DEFAULT_SYSTEM_NAME: &str = "hivecluster";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7337;
const EVENT_BUFFER: usize = 256;
const MAX_HISTORICAL_INCARNATIONS: usize = 4;

/// How many replaced incarnations are kept per physical node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub max_historical_incarnations: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_historical_incarnations: MAX_HISTORICAL_INCARNATIONS,
        }
    }
}

/// Configuration of the local cluster member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    pub system_name: String,
    pub host: String,
    pub port: u16,
    /// Capacity of the cluster event broadcast channel.
    pub event_buffer: usize,
    pub retention: RetentionPolicy,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            event_buffer: EVENT_BUFFER,
            retention: RetentionPolicy::default(),
        }
    }
}

impl MembershipConfig {
    /// Loads a JSON configuration file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: MembershipConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MembershipError> {
        if self.host.trim().is_empty() {
            return Err(MembershipError::InvalidConfiguration(
                "host must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(MembershipError::InvalidConfiguration(
                "port must be non-zero".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(MembershipError::InvalidConfiguration(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn node(&self) -> Node {
        Node::new(self.system_name.clone(), self.host.clone(), self.port)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
