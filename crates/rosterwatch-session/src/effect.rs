//! Side effects requested by the reconciler.
//!
//! The reconciler never performs I/O. Every kick, ban, cache eviction,
//! or chat message it wants is returned as an [`Effect`], in the order it
//! should happen, and the registry's driver carries it out.

use std::fmt;

use rosterwatch_protocol::{PersonaId, Player, ServerRoster};

use crate::CongestionAlert;

/// One side effect of a roster update or session close.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Hand the updated roster to the server autosay channel.
    Autosay { roster: ServerRoster, is_warm: bool },

    /// Persist players granted warm status.
    RecordWarmed { players: Vec<Player> },

    /// Clear a temporary blacklist entry for a freshly warmed player,
    /// if one exists.
    ClearTemporaryBan { player: Player },

    /// Check a joining player against both blacklists.
    ///
    /// `session_warm` gates the temporary-blacklist fast path.
    Screen { player: Player, session_warm: bool },

    /// Submit a join batch to life-statistics threshold enforcement.
    LifeStatsCheck { players: Vec<Player> },

    /// Submit a join batch to weapon/vehicle anomaly enforcement.
    AnomalyCheck { players: Vec<Player> },

    /// Tag a player as in-game for presence bookkeeping.
    MarkInGame { player: Player },

    /// Drop any cached life statistics for a persona.
    EvictLifeStats { persona_id: PersonaId },

    /// Clear a player's in-game presence tag.
    ClearInGame { player: Player },

    /// Queue a departed player for post-game settlement.
    Settle { player: Player },

    /// Post a message to the server's chat group.
    Announce(Announcement),
}

/// Chat announcements.
#[derive(Debug, Clone, PartialEq)]
pub enum Announcement {
    /// The session turned warm and these players were granted warm status.
    WarmSuccess {
        server: String,
        warmed: Vec<String>,
        population: usize,
    },

    /// The session dropped below its warm threshold.
    WentCold { server: String, population: usize },

    /// Community members joined a cold session that is still filling up.
    WarmingUp {
        server: String,
        members: Vec<String>,
        population: usize,
    },

    /// The queue looks stuck.
    Congestion(CongestionAlert),

    Kicked {
        server: String,
        player: String,
        reason: String,
    },

    Banned {
        server: String,
        player: String,
        reason: String,
    },
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WarmSuccess {
                server,
                warmed,
                population,
            } => write!(
                f,
                "[{server}] warm-up complete at {population} players, {} warmed: {}",
                warmed.len(),
                warmed.join(", ")
            ),
            Self::WentCold { server, population } => {
                write!(f, "[{server}] went cold at {population} players")
            }
            Self::WarmingUp {
                server,
                members,
                population,
            } => write!(
                f,
                "[{server}] warming up: {} joined, {population} players",
                members.join(", ")
            ),
            Self::Congestion(alert) => write!(f, "{alert}"),
            Self::Kicked {
                server,
                player,
                reason,
            } => write!(f, "[{server}] kicked {player}: {reason}"),
            Self::Banned {
                server,
                player,
                reason,
            } => write!(f, "[{server}] banned {player}: {reason}"),
        }
    }
}
