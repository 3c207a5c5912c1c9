//! Interfaces to everything outside the engine.
//!
//! Blacklists, reputation services, chat, presence, and the game server's
//! admin API all live behind these traits. Each one is object-safe so the
//! registry can hold them as `Arc<dyn …>` in a [`Collaborators`] bundle.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rosterwatch_protocol::{LifeStats, PersonaId, Player, ServerConfig, ServerRoster, SessionId};
use serde::{Deserialize, Serialize};

use crate::memory::{MemoryBlacklist, MemoryLifeStats, MemoryWarmLedger};
use crate::CollabError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Which blacklist a record lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanKind {
    Permanent,
    Temporary,
}

/// One blacklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistRecord {
    pub persona_id: PersonaId,
    pub name: String,
    pub kind: BanKind,
    /// Short category label, e.g. "ping" or "behaviour".
    pub category: String,
    pub reason: String,
    /// Who added the entry.
    pub admin: String,
    pub added_at: DateTime<Utc>,
}

impl BlacklistRecord {
    /// Kick reason for a temporary-blacklist hit: `<category>临时黑名单[<reason>]`.
    pub fn temporary_reason(&self) -> String {
        format!("{}临时黑名单[{}]", self.category, self.reason)
    }

    /// Ban reason for a permanent-blacklist hit. Restricted servers get
    /// the bare reason.
    pub fn ban_reason(&self, server: &ServerConfig) -> String {
        if server.is_restricted() {
            self.reason.clone()
        } else {
            format!("本地黑名单[{}]", self.reason)
        }
    }
}

/// Account details from a reputation lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationProfile {
    pub name: String,
    pub persona_id: PersonaId,
    pub register_date: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Result of a community or ban-case status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub is_normal: bool,
    pub reason: String,
}

impl fmt::Display for StatusCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_normal {
            write!(f, "normal")
        } else {
            write!(f, "flagged ({})", self.reason)
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persistent permanent and temporary blacklists.
///
/// Adding a record for a persona already on that list replaces it.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    async fn permanent(
        &self,
        persona_id: PersonaId,
    ) -> Result<Option<BlacklistRecord>, CollabError>;
    async fn temporary(
        &self,
        persona_id: PersonaId,
    ) -> Result<Option<BlacklistRecord>, CollabError>;
    async fn clear_temporary(&self, persona_id: PersonaId) -> Result<(), CollabError>;
    async fn add(&self, record: BlacklistRecord) -> Result<(), CollabError>;
    /// Returns `true` if a record was removed.
    async fn remove(&self, kind: BanKind, persona_id: PersonaId) -> Result<bool, CollabError>;
    async fn list(&self, kind: BanKind) -> Result<Vec<BlacklistRecord>, CollabError>;
}

/// Third-party player and ban-case lookups.
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    /// Fails with [`CollabError::NotFound`] for unknown names.
    async fn lookup_by_name(&self, name: &str) -> Result<ReputationProfile, CollabError>;
    async fn community_status(&self, persona_id: PersonaId) -> Result<StatusCheck, CollabError>;
    async fn ban_case_status(&self, persona_id: PersonaId) -> Result<StatusCheck, CollabError>;
}

#[async_trait]
pub trait BotRoster: Send + Sync {
    async fn known_bot_names(&self) -> Result<HashSet<String>, CollabError>;
}

/// Record of players who have been granted warm status.
#[async_trait]
pub trait WarmPlayerLedger: Send + Sync {
    async fn record(&self, server: &str, players: &[Player]) -> Result<(), CollabError>;
    async fn warmed_names(&self) -> Result<HashSet<String>, CollabError>;
}

/// Outbound chat.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn notify(
        &self,
        group_id: i64,
        text: &str,
        reply_to: Option<i64>,
        mention: Option<i64>,
    ) -> Result<(), CollabError>;
}

/// Cached detailed life statistics, keyed by persona.
#[async_trait]
pub trait LifeStatsCache: Send + Sync {
    async fn get(&self, persona_id: PersonaId) -> Option<LifeStats>;
    async fn insert(&self, stats: LifeStats);
    async fn evict(&self, persona_id: PersonaId);
}

/// Post-game bookkeeping for departed players.
#[async_trait]
pub trait SettlementQueue: Send + Sync {
    async fn enqueue(
        &self,
        session_id: SessionId,
        server: &ServerConfig,
        player: &Player,
    ) -> Result<(), CollabError>;
}

/// The game server's admin API.
#[async_trait]
pub trait GameAdmin: Send + Sync {
    async fn kick(
        &self,
        session_id: SessionId,
        player: &Player,
        reason: &str,
        admin: &str,
    ) -> Result<(), CollabError>;

    async fn ban(
        &self,
        session_id: SessionId,
        player: &Player,
        reason: &str,
        admin: &str,
    ) -> Result<(), CollabError>;
}

/// Batch enforcement checks that act on their own schedule.
#[async_trait]
pub trait EnforcementChecks: Send + Sync {
    async fn life_stats(
        &self,
        session_id: SessionId,
        server: &ServerConfig,
        players: &[Player],
    ) -> Result<(), CollabError>;

    async fn weapon_anomaly(
        &self,
        session_id: SessionId,
        server: &ServerConfig,
        players: &[Player],
    ) -> Result<(), CollabError>;
}

/// Online-status bookkeeping for group nicknames.
#[async_trait]
pub trait Presence: Send + Sync {
    async fn mark_in_game(&self, player: &Player, server: &str) -> Result<(), CollabError>;
    async fn clear_in_game(&self, player: &Player) -> Result<(), CollabError>;
}

/// In-game autosay channel, fed every accepted roster.
#[async_trait]
pub trait Autosay: Send + Sync {
    async fn on_roster(
        &self,
        session_id: SessionId,
        server: &ServerConfig,
        roster: &ServerRoster,
        is_warm: bool,
    ) -> Result<(), CollabError>;
}

/// Recognized community members.
#[async_trait]
pub trait CommunityDirectory: Send + Sync {
    /// Persona → nickname.
    async fn members(&self) -> Result<HashMap<PersonaId, String>, CollabError>;
}

// ---------------------------------------------------------------------------
// Unwired
// ---------------------------------------------------------------------------

/// Stand-in for collaborators that are not connected.
///
/// Lookups come back empty, notifications are dropped, and anything that
/// would act on a player is rejected so it is never announced as done.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unwired;

#[async_trait]
impl ReputationLookup for Unwired {
    async fn lookup_by_name(&self, _name: &str) -> Result<ReputationProfile, CollabError> {
        Err(CollabError::Rejected("reputation lookup not configured".into()))
    }

    async fn community_status(&self, _persona_id: PersonaId) -> Result<StatusCheck, CollabError> {
        Err(CollabError::Rejected("reputation lookup not configured".into()))
    }

    async fn ban_case_status(&self, _persona_id: PersonaId) -> Result<StatusCheck, CollabError> {
        Err(CollabError::Rejected("reputation lookup not configured".into()))
    }
}

#[async_trait]
impl BotRoster for Unwired {
    async fn known_bot_names(&self) -> Result<HashSet<String>, CollabError> {
        Ok(HashSet::new())
    }
}

#[async_trait]
impl Messenger for Unwired {
    async fn notify(
        &self,
        group_id: i64,
        text: &str,
        _reply_to: Option<i64>,
        _mention: Option<i64>,
    ) -> Result<(), CollabError> {
        tracing::trace!(group_id, text, "no messenger, dropping notification");
        Ok(())
    }
}

#[async_trait]
impl SettlementQueue for Unwired {
    async fn enqueue(
        &self,
        _session_id: SessionId,
        _server: &ServerConfig,
        _player: &Player,
    ) -> Result<(), CollabError> {
        Ok(())
    }
}

#[async_trait]
impl GameAdmin for Unwired {
    async fn kick(
        &self,
        _session_id: SessionId,
        _player: &Player,
        _reason: &str,
        _admin: &str,
    ) -> Result<(), CollabError> {
        Err(CollabError::Rejected("game admin not configured".into()))
    }

    async fn ban(
        &self,
        _session_id: SessionId,
        _player: &Player,
        _reason: &str,
        _admin: &str,
    ) -> Result<(), CollabError> {
        Err(CollabError::Rejected("game admin not configured".into()))
    }
}

#[async_trait]
impl EnforcementChecks for Unwired {
    async fn life_stats(
        &self,
        _session_id: SessionId,
        _server: &ServerConfig,
        _players: &[Player],
    ) -> Result<(), CollabError> {
        Ok(())
    }

    async fn weapon_anomaly(
        &self,
        _session_id: SessionId,
        _server: &ServerConfig,
        _players: &[Player],
    ) -> Result<(), CollabError> {
        Ok(())
    }
}

#[async_trait]
impl Presence for Unwired {
    async fn mark_in_game(&self, _player: &Player, _server: &str) -> Result<(), CollabError> {
        Ok(())
    }

    async fn clear_in_game(&self, _player: &Player) -> Result<(), CollabError> {
        Ok(())
    }
}

#[async_trait]
impl Autosay for Unwired {
    async fn on_roster(
        &self,
        _session_id: SessionId,
        _server: &ServerConfig,
        _roster: &ServerRoster,
        _is_warm: bool,
    ) -> Result<(), CollabError> {
        Ok(())
    }
}

#[async_trait]
impl CommunityDirectory for Unwired {
    async fn members(&self) -> Result<HashMap<PersonaId, String>, CollabError> {
        Ok(HashMap::new())
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Every collaborator the engine talks to.
///
/// Cheap to clone. [`Default`] wires the in-memory stores and leaves
/// everything else [`Unwired`]; override fields with struct update syntax.
#[derive(Clone)]
pub struct Collaborators {
    pub blacklist: Arc<dyn BlacklistStore>,
    pub reputation: Arc<dyn ReputationLookup>,
    pub bots: Arc<dyn BotRoster>,
    pub warm_ledger: Arc<dyn WarmPlayerLedger>,
    pub messenger: Arc<dyn Messenger>,
    pub life_stats: Arc<dyn LifeStatsCache>,
    pub settlement: Arc<dyn SettlementQueue>,
    pub admin: Arc<dyn GameAdmin>,
    pub enforcement: Arc<dyn EnforcementChecks>,
    pub presence: Arc<dyn Presence>,
    pub autosay: Arc<dyn Autosay>,
    pub community: Arc<dyn CommunityDirectory>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            blacklist: Arc::new(MemoryBlacklist::default()),
            reputation: Arc::new(Unwired),
            bots: Arc::new(Unwired),
            warm_ledger: Arc::new(MemoryWarmLedger::default()),
            messenger: Arc::new(Unwired),
            life_stats: Arc::new(MemoryLifeStats::default()),
            settlement: Arc::new(Unwired),
            admin: Arc::new(Unwired),
            enforcement: Arc::new(Unwired),
            presence: Arc::new(Unwired),
            autosay: Arc::new(Unwired),
            community: Arc::new(Unwired),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rosterwatch_protocol::ServerVariant;

    use super::*;

    fn record() -> BlacklistRecord {
        BlacklistRecord {
            persona_id: PersonaId(9),
            name: "mallory".into(),
            kind: BanKind::Permanent,
            category: "ping".into(),
            reason: "cheating".into(),
            admin: "alice".into(),
            added_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_temporary_reason_format() {
        assert_eq!(record().temporary_reason(), "ping临时黑名单[cheating]");
    }

    #[test]
    fn test_ban_reason_depends_on_variant() {
        let standard = ServerConfig::named("alpha");
        let restricted = ServerConfig {
            variant: ServerVariant::Restricted,
            ..ServerConfig::named("relay")
        };
        assert_eq!(record().ban_reason(&standard), "本地黑名单[cheating]");
        assert_eq!(record().ban_reason(&restricted), "cheating");
    }

    #[tokio::test]
    async fn test_unwired_admin_rejects_actions() {
        let player = Player::from_entry(
            &rosterwatch_protocol::RosterEntry::new("bob", 1, rosterwatch_protocol::Team::TeamOne),
            Utc::now(),
        );
        let result = Unwired.kick(SessionId(1), &player, "r", "a").await;
        assert!(matches!(result, Err(CollabError::Rejected(_))));
    }
}
