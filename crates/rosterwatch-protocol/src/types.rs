//! Core roster types.
//!
//! Everything here is plain value data. Rosters are rebuilt from every
//! poll, and players are copied into rosters and logs rather than shared,
//! so each session owns its own view of who is on the server.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Player slots per team.
pub const TEAM_CAPACITY: usize = 32;

/// Total player slots on a full server (two teams).
pub const SERVER_CAPACITY: usize = TEAM_CAPACITY * 2;

/// Non-bot soldier count at which a cold server turns warm.
pub const WARM_ACTIVATION: usize = 42;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable numeric identity of a player.
///
/// Survives name changes, so every diff and cache key uses it rather than
/// the display name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PersonaId(pub u64);

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid-{}", self.0)
    }
}

/// Volatile identifier of one running game instance.
///
/// A server gets a new session id every time it restarts, so this is not
/// a server identity. Use [`ServerConfig::name`] for that.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// Where a player currently sits on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    TeamOne,
    TeamTwo,
    /// Waiting for a free slot.
    Queue,
    /// Watching without a slot. Only found in the spectator partition.
    Spectator,
}

impl Team {
    /// Returns `true` for the two playable sides.
    pub fn is_soldier(&self) -> bool {
        matches!(self, Self::TeamOne | Self::TeamTwo)
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TeamOne => write!(f, "team-one"),
            Self::TeamTwo => write!(f, "team-two"),
            Self::Queue => write!(f, "queue"),
            Self::Spectator => write!(f, "spectator"),
        }
    }
}

// ---------------------------------------------------------------------------
// RosterEntry / RosterSnapshot (poller input)
// ---------------------------------------------------------------------------

/// One player as reported by the poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub persona_id: PersonaId,
    pub team: Team,
    #[serde(default)]
    pub platoon: Option<String>,
}

impl RosterEntry {
    pub fn new(name: impl Into<String>, persona_id: u64, team: Team) -> Self {
        Self {
            name: name.into(),
            persona_id: PersonaId(persona_id),
            team,
            platoon: None,
        }
    }

    /// Sets the platoon tag.
    pub fn with_platoon(mut self, platoon: impl Into<String>) -> Self {
        self.platoon = Some(platoon.into());
        self
    }
}

/// A raw roster poll for one session.
///
/// `spectators` is `None` when the upstream did not supply a fresh
/// spectator list this cycle; the session then keeps the last one it saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub soldiers: Vec<RosterEntry>,
    pub queue: Vec<RosterEntry>,
    #[serde(default)]
    pub spectators: Option<Vec<RosterEntry>>,
}

impl RosterSnapshot {
    /// Returns `true` if all three partitions are empty.
    pub fn is_empty(&self) -> bool {
        self.soldiers.is_empty()
            && self.queue.is_empty()
            && self.spectators.as_ref().is_none_or(|s| s.is_empty())
    }

    /// Finds a persona id that appears in more than one partition, or
    /// twice within one.
    pub fn overlapping_persona(&self) -> Option<PersonaId> {
        let mut seen = HashSet::new();
        let spectators = self.spectators.iter().flatten();
        self.soldiers
            .iter()
            .chain(self.queue.iter())
            .chain(spectators)
            .map(|e| e.persona_id)
            .find(|id| !seen.insert(*id))
    }
}

// ---------------------------------------------------------------------------
// Player / ServerRoster (session state)
// ---------------------------------------------------------------------------

/// A player as tracked by a session.
///
/// Rebuilt on every poll. `joined_at`, `warm_since`, and `is_warmed` are
/// carried across polls by persona id; everything else comes from the
/// latest [`RosterEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub persona_id: PersonaId,
    pub team: Team,
    pub platoon: Option<String>,
    /// When this persona was first seen in the current session.
    pub joined_at: DateTime<Utc>,
    /// Start of the current warm-eligibility window. Reset whenever the
    /// server goes cold.
    pub warm_since: DateTime<Utc>,
    pub is_warmed: bool,
    pub is_bot: bool,
}

impl Player {
    /// Builds a freshly seen player.
    pub fn from_entry(entry: &RosterEntry, now: DateTime<Utc>) -> Self {
        Self {
            name: entry.name.clone(),
            persona_id: entry.persona_id,
            team: entry.team,
            platoon: entry.platoon.clone(),
            joined_at: now,
            warm_since: now,
            is_warmed: false,
            is_bot: false,
        }
    }

    /// How long the player has been in the session.
    pub fn time_present(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.joined_at
    }
}

/// The stored roster of one session.
///
/// Invariant: `soldiers`, `queue`, and `spectators` are disjoint by
/// persona id. `bots` is a derived view of the soldiers whose names are
/// on the known-bot list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRoster {
    pub soldiers: Vec<Player>,
    pub queue: Vec<Player>,
    pub spectators: Vec<Player>,
    pub bots: Vec<Player>,
}

impl ServerRoster {
    /// Returns `true` if the roster holds no players at all.
    pub fn is_empty(&self) -> bool {
        self.soldiers.is_empty() && self.queue.is_empty() && self.spectators.is_empty()
    }

    /// Soldiers on one side, bots included.
    pub fn team(&self, team: Team) -> impl Iterator<Item = &Player> {
        self.soldiers.iter().filter(move |p| p.team == team)
    }

    /// Soldiers on one side, bots excluded.
    pub fn human_team(&self, team: Team) -> impl Iterator<Item = &Player> {
        self.team(team).filter(|p| !p.is_bot)
    }

    /// Number of soldiers that are not bots.
    pub fn human_soldier_count(&self) -> usize {
        self.soldiers.iter().filter(|p| !p.is_bot).count()
    }

    /// Every player in soldier, queue, and spectator order.
    pub fn all_players(&self) -> impl Iterator<Item = &Player> {
        self.soldiers
            .iter()
            .chain(self.queue.iter())
            .chain(self.spectators.iter())
    }

    /// Looks a player up by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&Player> {
        let needle = name.to_lowercase();
        self.all_players().find(|p| p.name.to_lowercase() == needle)
    }

    /// Looks a player up by persona id.
    pub fn find_by_persona(&self, persona_id: PersonaId) -> Option<&Player> {
        self.all_players().find(|p| p.persona_id == persona_id)
    }

    /// Names of every player, in [`all_players`](Self::all_players) order.
    pub fn names(&self) -> Vec<String> {
        self.all_players().map(|p| p.name.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// The flavor of server a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerVariant {
    #[default]
    Standard,
    /// Restricted or relay server: no queue concept, plain ban reasons.
    Restricted,
}

/// Per-server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name as reported by the poller.
    pub name: String,

    /// Chat group that receives this server's announcements.
    pub group_id: i64,

    pub variant: ServerVariant,

    /// A warm session goes cold when its non-bot soldier count drops
    /// below this value. Never above [`WARM_ACTIVATION`].
    pub warm_threshold: usize,

    /// Players granted warm status per warm transition (half per team).
    pub warm_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            group_id: 0,
            variant: ServerVariant::Standard,
            warm_threshold: 30,
            warm_capacity: 40,
        }
    }
}

impl ServerConfig {
    /// Creates a standard server config with default thresholds.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_restricted(&self) -> bool {
        self.variant == ServerVariant::Restricted
    }

    /// Clamps out-of-range values and rejects unusable ones.
    ///
    /// - `warm_threshold` is capped to [`WARM_ACTIVATION`]; a higher
    ///   value would make a freshly warmed session go cold on the next poll.
    /// - `warm_capacity` is capped to [`SERVER_CAPACITY`].
    pub fn validated(mut self) -> Result<Self, ProtocolError> {
        if self.name.trim().is_empty() {
            return Err(ProtocolError::InvalidConfig(
                "server name must not be empty".into(),
            ));
        }
        if self.warm_threshold > WARM_ACTIVATION {
            tracing::warn!(
                server = %self.name,
                warm_threshold = self.warm_threshold,
                max = WARM_ACTIVATION,
                "warm_threshold above activation count, clamping"
            );
            self.warm_threshold = WARM_ACTIVATION;
        }
        self.warm_capacity = self.warm_capacity.min(SERVER_CAPACITY);
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Join,
    Leave,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join => write!(f, "join"),
            Self::Leave => write!(f, "leave"),
        }
    }
}

/// One join or leave in a session's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub name: String,
    pub persona_id: PersonaId,
    pub team: Team,
    pub platoon: Option<String>,
    pub action: LogAction,
}

impl LogEntry {
    pub fn new(player: &Player, action: LogAction, at: DateTime<Utc>) -> Self {
        Self {
            at,
            name: player.name.clone(),
            persona_id: player.persona_id,
            team: player.team,
            platoon: player.platoon.clone(),
            action,
        }
    }
}

/// Renders as `HH:MM:SS join name [platoon] (team-one)`.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.at.format("%H:%M:%S"), self.action)?;
        match &self.platoon {
            Some(tag) => write!(f, "{} [{}]", self.name, tag)?,
            None => write!(f, "{}", self.name)?,
        }
        write!(f, " ({})", self.team)
    }
}
