//! Stuck-queue detection.
//!
//! A full team plus a non-empty queue while the other team still has
//! plenty of free slots usually means the queue is stuck behind one
//! player whose join never completes. The detector spots that pattern,
//! names the most likely culprit, and then stays quiet for a cooldown.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rosterwatch_protocol::{
    PersonaId, Player, ServerConfig, ServerRoster, SessionId, Team, TEAM_CAPACITY,
};
use serde::{Deserialize, Serialize};

/// Detector thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CongestionConfig {
    /// Minimum time between two alerts from one detector.
    pub cooldown: Duration,
    /// Free slots on the emptier team needed before the queue counts as stuck.
    pub min_free_slots: usize,
    /// Queued players waiting less than this are ignored.
    pub min_wait: Duration,
    /// Queued players waiting longer than this are ignored (stale timers).
    pub max_wait: Duration,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5 * 60),
            min_free_slots: 6,
            min_wait: Duration::from_secs(3 * 60),
            max_wait: Duration::from_secs(100 * 60),
        }
    }
}

/// A probable stuck queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CongestionAlert {
    pub session_id: SessionId,
    pub server: String,
    pub team_one: usize,
    pub team_two: usize,
    pub queue: usize,
    pub suspect: String,
    pub suspect_persona: PersonaId,
    pub waited: TimeDelta,
}

impl fmt::Display for CongestionAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] queue may be stuck: {}/{} with {} queued, {} waiting {} min",
            self.server,
            self.team_one,
            self.team_two,
            self.queue,
            self.suspect,
            self.waited.num_minutes()
        )
    }
}

/// Stuck-queue detector with its own alert cooldown.
#[derive(Debug, Clone, Default)]
pub struct CongestionDetector {
    config: CongestionConfig,
    last_alert: Option<DateTime<Utc>>,
}

impl CongestionDetector {
    pub fn new(config: CongestionConfig) -> Self {
        Self {
            config,
            last_alert: None,
        }
    }

    /// When this detector last raised an alert.
    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        self.last_alert
    }

    /// [`check`](Self::check) against a stored roster.
    pub fn check_roster(
        &mut self,
        server: &ServerConfig,
        roster: &ServerRoster,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Option<CongestionAlert> {
        let team_one: Vec<Player> = roster.team(Team::TeamOne).cloned().collect();
        let team_two: Vec<Player> = roster.team(Team::TeamTwo).cloned().collect();
        self.check(server, &team_one, &team_two, &roster.queue, session_id, now)
    }

    /// Checks one roster for a stuck queue.
    ///
    /// Bots are left out of the team sizes. Restricted servers have no
    /// queue and are skipped. Returns an alert at most once per cooldown;
    /// a check that finds no plausible suspect does not start one.
    pub fn check(
        &mut self,
        server: &ServerConfig,
        team_one: &[Player],
        team_two: &[Player],
        queue: &[Player],
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Option<CongestionAlert> {
        if server.is_restricted() || queue.is_empty() {
            return None;
        }

        let t1 = team_one.iter().filter(|p| !p.is_bot).count();
        let t2 = team_two.iter().filter(|p| !p.is_bot).count();
        if t1.max(t2) < TEAM_CAPACITY {
            return None;
        }
        let free_slots = TEAM_CAPACITY.saturating_sub(t1.min(t2));
        if free_slots < self.config.min_free_slots {
            return None;
        }

        if let Some(last) = self.last_alert {
            let since = (now - last).to_std().unwrap_or(Duration::ZERO);
            if since < self.config.cooldown {
                tracing::trace!(%session_id, "congestion check inside cooldown");
                return None;
            }
        }

        let suspect = queue
            .iter()
            .filter(|p| {
                (now - p.joined_at)
                    .to_std()
                    .is_ok_and(|w| w >= self.config.min_wait && w <= self.config.max_wait)
            })
            .min_by_key(|p| p.joined_at)?;

        self.last_alert = Some(now);
        let alert = CongestionAlert {
            session_id,
            server: server.name.clone(),
            team_one: t1,
            team_two: t2,
            queue: queue.len(),
            suspect: suspect.name.clone(),
            suspect_persona: suspect.persona_id,
            waited: now - suspect.joined_at,
        };
        tracing::info!(
            %session_id,
            server = %alert.server,
            team_one = t1,
            team_two = t2,
            queue = alert.queue,
            suspect = %alert.suspect,
            "queue congestion detected"
        );
        Some(alert)
    }
}
