//! The `Watcher`: poll ingestion and query commands.
//!
//! This is the entry point for a deployment. A poller feeds it
//! [`PollEvent`]s; chat commands call the query methods.

use std::fmt;

use rosterwatch_fuzzy::{search, SearchOptions};
use rosterwatch_protocol::{RosterSnapshot, SessionId};
use rosterwatch_registry::{
    Collaborators, PlayerLookup, Registry, ReputationReply, ReputationService,
};
use rosterwatch_retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{WatchConfig, WatchError};

/// One roster poll, as produced by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPoll {
    pub session_id: SessionId,
    /// Server name; must match a configured server.
    pub server: String,
    pub map_name: String,
    pub map_mode: String,
    pub snapshot: RosterSnapshot,
}

/// What the poller sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PollEvent {
    Poll(RosterPoll),
    /// The upstream reported the server closed.
    Close { session_id: SessionId },
}

/// Reply to a player query.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerQuery {
    Found(PlayerLookup),
    /// No exact match; the closest names, possibly none.
    Suggestions(Vec<String>),
}

impl fmt::Display for PlayerQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(found) => {
                let p = &found.player;
                write!(f, "{} ({}) on {} [{}]", p.name, p.persona_id, found.server, p.team)?;
                if let Some(stats) = &found.life_stats {
                    write!(f, ", K/D {:.2}, KPM {:.2}", stats.kd(), stats.kpm())?;
                }
                Ok(())
            }
            Self::Suggestions(names) if names.is_empty() => write!(f, "no such player online"),
            Self::Suggestions(names) => write!(f, "not found, did you mean: {}", names.join(", ")),
        }
    }
}

/// Ties configuration, the registry, and reputation lookups together.
pub struct Watcher {
    config: WatchConfig,
    registry: Registry,
    reputation: ReputationService,
}

impl Watcher {
    /// Validates `config` and builds a watcher over `collab`.
    pub fn new(config: WatchConfig, collab: Collaborators) -> Result<Self, WatchError> {
        let config = config.validated()?;
        let registry = Registry::new(config.registry.clone(), collab);
        Ok(Self::assemble(config, registry))
    }

    /// Builds a watcher around an existing registry.
    pub fn with_registry(config: WatchConfig, registry: Registry) -> Result<Self, WatchError> {
        let config = config.validated()?;
        Ok(Self::assemble(config, registry))
    }

    fn assemble(config: WatchConfig, registry: Registry) -> Self {
        let reputation = ReputationService::new(
            registry.collaborators().reputation.clone(),
            RetryPolicy::new(config.retry.clone()),
        );
        Self {
            config,
            registry,
            reputation,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Routes a poll to its session.
    ///
    /// A poll for an unconfigured server is logged and rejected with
    /// [`WatchError::ConfigurationMismatch`]; other servers are unaffected.
    pub async fn ingest(&self, poll: RosterPoll) -> Result<(), WatchError> {
        let Some(server) = self.config.server(&poll.server) else {
            tracing::warn!(
                session_id = %poll.session_id,
                server = %poll.server,
                "poll for unconfigured server skipped"
            );
            return Err(WatchError::ConfigurationMismatch {
                server: poll.server,
            });
        };

        self.registry
            .upsert(
                poll.session_id,
                &poll.map_name,
                &poll.map_mode,
                poll.snapshot,
                server.clone(),
            )
            .await?;
        Ok(())
    }

    pub async fn close(&self, session_id: SessionId) -> Result<(), WatchError> {
        self.registry.close(session_id).await?;
        Ok(())
    }

    /// Exact (case-insensitive) lookup, falling back to fuzzy suggestions
    /// over every online name.
    pub async fn find_player(&self, query: &str) -> PlayerQuery {
        if let Some(found) = self.registry.find_player(query).await {
            return PlayerQuery::Found(found);
        }
        let names = self.registry.flatten_all_names().await;
        PlayerQuery::Suggestions(search(query, &names, SearchOptions::default()))
    }

    pub async fn check_reputation(&self, name: &str) -> ReputationReply {
        self.reputation.check(name).await
    }

    pub async fn recent_log(&self, server: &str, count: usize) -> Vec<String> {
        self.registry.recent_log(server, count).await
    }

    /// Drains `events` until the channel closes. Errors are logged per
    /// event and never stop the loop.
    pub async fn run(&self, mut events: mpsc::Receiver<PollEvent>) {
        tracing::info!(servers = self.config.servers.len(), "watcher running");

        while let Some(event) = events.recv().await {
            let result = match event {
                PollEvent::Poll(poll) => self.ingest(poll).await,
                PollEvent::Close { session_id } => self.close(session_id).await,
            };
            match result {
                Ok(()) | Err(WatchError::ConfigurationMismatch { .. }) => {}
                Err(error) => tracing::warn!(%error, "poll event failed"),
            }
        }

        tracing::info!("poll channel closed, watcher stopped");
    }
}
