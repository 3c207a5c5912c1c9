//! The registry: every live session, keyed by session id.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rosterwatch_protocol::{LifeStats, Player, RosterSnapshot, ServerConfig, SessionId};
use rosterwatch_session::{CongestionDetector, SessionError, SessionInfo, UpdateOutcome};
use tokio::sync::{oneshot, Mutex};

use crate::actor::{spawn_session, Clock, DetectorSlot, SessionHandle, SessionSetup};
use crate::collab::Collaborators;
use crate::config::{CongestionScope, RegistryConfig};
use crate::driver::EffectDriver;
use crate::RegistryError;

/// A player found by [`Registry::find_player`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerLookup {
    pub player: Player,
    pub session_id: SessionId,
    pub server: String,
    /// Cached detailed stats, if any.
    pub life_stats: Option<LifeStats>,
}

/// Owns the session actors.
///
/// The session map lock is held only to look up, insert, or remove
/// handles, never while a session is working.
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    config: RegistryConfig,
    collab: Collaborators,
    /// Used when [`CongestionScope::Global`] is configured.
    shared_detector: Arc<Mutex<CongestionDetector>>,
    clock: Clock,
}

impl Registry {
    pub fn new(config: RegistryConfig, collab: Collaborators) -> Self {
        Self::with_clock(config, collab, Arc::new(Utc::now))
    }

    /// A registry whose sessions read the time from `clock`.
    pub fn with_clock(config: RegistryConfig, collab: Collaborators, clock: Clock) -> Self {
        let config = config.validated();
        let shared_detector = Arc::new(Mutex::new(CongestionDetector::new(
            config.congestion.clone(),
        )));
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            collab,
            shared_detector,
            clock,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    /// Routes one poll to its session, creating the session on first
    /// sight of a non-empty roster.
    ///
    /// Never waits on the session: reconciliation and enforcement happen
    /// on the session's own tasks. A session whose channel is full drops
    /// the poll with [`RegistryError::Backlogged`].
    pub async fn upsert(
        &self,
        session_id: SessionId,
        map_name: &str,
        map_mode: &str,
        snapshot: RosterSnapshot,
        server: ServerConfig,
    ) -> Result<(), RegistryError> {
        let Some(handle) = self.handle_for(session_id, &snapshot, &server).await? else {
            return Ok(());
        };
        handle.update(map_name, map_mode, snapshot, server, None)
    }

    /// Like [`upsert`](Self::upsert), but waits until the poll has been
    /// reconciled and returns the outcome. Effects still run afterwards on
    /// the session task.
    ///
    /// Returns `Ok(None)` when the poll was skipped because no session
    /// exists and the roster is empty.
    pub async fn reconcile(
        &self,
        session_id: SessionId,
        map_name: &str,
        map_mode: &str,
        snapshot: RosterSnapshot,
        server: ServerConfig,
    ) -> Result<Option<UpdateOutcome>, RegistryError> {
        let Some(handle) = self.handle_for(session_id, &snapshot, &server).await? else {
            return Ok(None);
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        handle.update(map_name, map_mode, snapshot, server, Some(reply_tx))?;
        let outcome = reply_rx
            .await
            .map_err(|_| RegistryError::Unavailable(session_id))??;
        Ok(Some(outcome))
    }

    /// The session's handle, spawning the session for a first poll that
    /// is non-empty and well-formed.
    async fn handle_for(
        &self,
        session_id: SessionId,
        snapshot: &RosterSnapshot,
        server: &ServerConfig,
    ) -> Result<Option<SessionHandle>, RegistryError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(&session_id) {
            return Ok(Some(handle.clone()));
        }
        if snapshot.is_empty() {
            tracing::debug!(%session_id, "empty roster for unknown session, skipped");
            return Ok(None);
        }
        if let Some(persona_id) = snapshot.overlapping_persona() {
            tracing::warn!(%session_id, %persona_id, "malformed first poll, session not created");
            return Err(SessionError::InvariantViolation {
                session_id,
                reason: format!("{persona_id} appears in more than one roster slot"),
            }
            .into());
        }

        let detector = match self.config.congestion_scope {
            CongestionScope::PerSession => {
                DetectorSlot::Owned(CongestionDetector::new(self.config.congestion.clone()))
            }
            CongestionScope::Global => DetectorSlot::Shared(Arc::clone(&self.shared_detector)),
        };
        let setup = SessionSetup {
            detector,
            collab: self.collab.clone(),
            driver: EffectDriver::new(
                self.collab.clone(),
                self.config.temp_blacklist_scope,
                self.config.call_timeout,
            ),
            clock: Arc::clone(&self.clock),
            channel_size: self.config.channel_size,
            call_timeout: self.config.call_timeout,
            query_timeout: self.config.query_timeout,
        };
        let handle = spawn_session(session_id, server.clone(), setup);
        sessions.insert(session_id, handle.clone());
        tracing::info!(%session_id, server = %server.name, "session created");
        Ok(Some(handle))
    }

    /// Runs the close procedure for a session and removes it. Unknown ids
    /// are a no-op.
    ///
    /// Waits up to the query timeout for the close effects; past that they
    /// keep running in the background.
    pub async fn close(&self, session_id: SessionId) -> Result<(), RegistryError> {
        let handle = self.sessions.lock().await.remove(&session_id);
        let Some(handle) = handle else {
            tracing::debug!(%session_id, "close for unknown session ignored");
            return Ok(());
        };
        match handle.close().await {
            Err(RegistryError::Timeout(_)) => {
                tracing::warn!(%session_id, "close effects still pending");
                Ok(())
            }
            result => result,
        }
    }

    /// Waits until every effect the session has queued so far has run.
    /// Unknown ids return immediately.
    pub async fn flush(&self, session_id: SessionId) -> Result<(), RegistryError> {
        let handle = self.sessions.lock().await.get(&session_id).cloned();
        match handle {
            Some(handle) => handle.flush().await,
            None => Ok(()),
        }
    }

    /// First session whose roster lists `name` (case-insensitive), with
    /// that player's cached stats.
    ///
    /// Sessions are searched in no particular order. A session that does
    /// not answer within the query timeout is skipped.
    pub async fn find_player(&self, name: &str) -> Option<PlayerLookup> {
        for handle in self.handles().await {
            let player = match handle.find_player(name).await {
                Ok(Some(player)) => player,
                Ok(None) | Err(_) => continue,
            };
            let server = match handle.info().await {
                Ok(info) => info.server,
                Err(_) => continue,
            };
            let life_stats = self.collab.life_stats.get(player.persona_id).await;
            return Some(PlayerLookup {
                player,
                session_id: handle.session_id(),
                server,
                life_stats,
            });
        }
        None
    }

    /// Every player name across all sessions.
    pub async fn flatten_all_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for handle in self.handles().await {
            if let Ok(session_names) = handle.names().await {
                names.extend(session_names);
            }
        }
        names
    }

    /// The last `count` log lines of the session running `server`.
    ///
    /// Empty if no live session runs that server.
    pub async fn recent_log(&self, server: &str, count: usize) -> Vec<String> {
        for handle in self.handles().await {
            let Ok(info) = handle.info().await else {
                continue;
            };
            if info.server.eq_ignore_ascii_case(server) {
                return handle.recent_log(count).await.unwrap_or_default();
            }
        }
        Vec::new()
    }

    /// Summary of one session, answered after every poll queued before
    /// this call.
    pub async fn session_info(&self, session_id: SessionId) -> Option<SessionInfo> {
        let handle = self.sessions.lock().await.get(&session_id).cloned()?;
        handle.info().await.ok()
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.lock().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Cloned handles, so callers can talk to sessions without holding
    /// the map lock.
    async fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.lock().await.values().cloned().collect()
    }
}
