//! Warm-up state machine.
//!
//! A session is either cold or warm, decided by its non-bot soldier
//! count:
//!
//! ```text
//!          count >= WARM_ACTIVATION
//!   Cold ───────────────────────────→ Warm
//!     ↑                                │
//!     └────────────────────────────────┘
//!          count < config.warm_threshold
//! ```
//!
//! Transitions only happen on these crossings. A warm session whose count
//! wanders between the threshold and the activation count stays warm.

use chrono::{DateTime, Utc};
use rosterwatch_protocol::{Player, ServerConfig, ServerRoster, Team, WARM_ACTIVATION};
use serde::{Deserialize, Serialize};

/// Population state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WarmState {
    #[default]
    Cold,
    Warm,
}

impl WarmState {
    pub fn is_warm(&self) -> bool {
        matches!(self, Self::Warm)
    }

    /// The state a session in `self` moves to at `human_soldiers`.
    ///
    /// Returns `None` when no boundary is crossed.
    pub fn next(self, human_soldiers: usize, config: &ServerConfig) -> Option<Self> {
        match self {
            Self::Cold if human_soldiers >= WARM_ACTIVATION => Some(Self::Warm),
            Self::Warm if human_soldiers < config.warm_threshold => Some(Self::Cold),
            _ => None,
        }
    }
}

impl std::fmt::Display for WarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cold => write!(f, "cold"),
            Self::Warm => write!(f, "warm"),
        }
    }
}

/// A warm-state change produced by one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Cold → warm. `warmed` holds the players granted warm status.
    WentWarm { warmed: Vec<Player> },
    /// Warm → cold. `reset` is how many players had their warm clock reset.
    WentCold { reset: usize },
}

/// Grants warm status to the longest-waiting players on each team.
///
/// Picks up to `capacity / 2` non-bot, not-yet-warmed soldiers per team,
/// ordered by `warm_since` (oldest first; ties keep roster order).
pub(crate) fn grant_warm(roster: &mut ServerRoster, capacity: usize) -> Vec<Player> {
    let per_team = capacity / 2;
    let mut warmed = Vec::new();

    for team in [Team::TeamOne, Team::TeamTwo] {
        let mut candidates: Vec<usize> = roster
            .soldiers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.team == team && !p.is_bot && !p.is_warmed)
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by_key(|&i| roster.soldiers[i].warm_since);

        for i in candidates.into_iter().take(per_team) {
            let player = &mut roster.soldiers[i];
            player.is_warmed = true;
            warmed.push(player.clone());
        }
    }

    warmed
}

/// Resets every present player's warm clock and clears warm status.
pub(crate) fn reset_warm(roster: &mut ServerRoster, now: DateTime<Utc>) -> usize {
    let mut reset = 0;
    for player in roster
        .soldiers
        .iter_mut()
        .chain(roster.queue.iter_mut())
        .chain(roster.spectators.iter_mut())
    {
        player.warm_since = now;
        player.is_warmed = false;
        reset += 1;
    }
    reset
}
