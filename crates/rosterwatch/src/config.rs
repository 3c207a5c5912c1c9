//! Engine configuration.

use std::collections::HashSet;

use rosterwatch_protocol::{ProtocolError, ServerConfig};
use rosterwatch_registry::RegistryConfig;
use rosterwatch_retry::RetryConfig;
use serde::{Deserialize, Serialize};

use crate::WatchError;

/// Everything a [`Watcher`](crate::Watcher) needs to start.
///
/// ```json
/// {
///   "servers": [{ "name": "alpha", "group_id": 1001, "warm_threshold": 28 }],
///   "registry": { "congestion_scope": "global" },
///   "retry": { "max_retries": 2 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub servers: Vec<ServerConfig>,
    pub registry: RegistryConfig,
    /// Retry policy for reputation lookups.
    pub retry: RetryConfig,
}

impl WatchConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, WatchError> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    /// Validates every server, rejecting duplicate names, and clamps the
    /// rest.
    pub fn validated(self) -> Result<Self, WatchError> {
        let mut seen = HashSet::new();
        let mut servers = Vec::with_capacity(self.servers.len());
        for server in self.servers {
            let server = server.validated()?;
            if !seen.insert(server.name.clone()) {
                return Err(ProtocolError::InvalidConfig(format!(
                    "server {:?} configured twice",
                    server.name
                ))
                .into());
            }
            servers.push(server);
        }

        Ok(Self {
            servers,
            registry: self.registry.validated(),
            retry: self.retry.validated(),
        })
    }

    /// The config for a server, by exact name.
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }
}
