//! Registry configuration.

use std::time::Duration;

use rosterwatch_session::CongestionConfig;
use serde::{Deserialize, Serialize};

/// Identity used for actions the engine takes on its own.
pub const SYSTEM_ADMIN: &str = "rosterwatch";

/// Who shares a congestion cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionScope {
    /// Every session has its own detector and cooldown.
    #[default]
    PerSession,
    /// One detector, and one cooldown, for the whole process.
    Global,
}

/// When a temporary-blacklist hit on join kicks immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempBlacklistScope {
    /// Only while the session is warm.
    #[default]
    WarmOnly,
    /// On every join.
    Always,
}

impl TempBlacklistScope {
    pub fn applies(&self, session_warm: bool) -> bool {
        match self {
            Self::WarmOnly => session_warm,
            Self::Always => true,
        }
    }
}

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Command channel size of each session actor. A poll arriving at a
    /// full channel is dropped and reported as backlogged.
    pub channel_size: usize,
    /// Upper bound on any single collaborator call. A call that runs
    /// longer is abandoned and logged like a network failure.
    pub call_timeout: Duration,
    /// How long a query waits on one session before skipping it.
    pub query_timeout: Duration,
    pub congestion: CongestionConfig,
    pub congestion_scope: CongestionScope,
    pub temp_blacklist_scope: TempBlacklistScope,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            call_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(2),
            congestion: CongestionConfig::default(),
            congestion_scope: CongestionScope::default(),
            temp_blacklist_scope: TempBlacklistScope::default(),
        }
    }
}

impl RegistryConfig {
    /// Clamp out-of-range values.
    pub fn validated(mut self) -> Self {
        if self.channel_size == 0 {
            tracing::warn!("channel_size 0 is invalid, using 1");
            self.channel_size = 1;
        }
        let defaults = Self::default();
        if self.call_timeout.is_zero() {
            tracing::warn!("call_timeout 0 is invalid, using default");
            self.call_timeout = defaults.call_timeout;
        }
        if self.query_timeout.is_zero() {
            tracing::warn!("query_timeout 0 is invalid, using default");
            self.query_timeout = defaults.query_timeout;
        }
        self
    }
}
