//! Normalized life statistics and the upstream payloads they come from.
//!
//! The stat providers answer in three different shapes. Each shape has its
//! own payload type and its own adapter, so callers always know which one
//! they hold and never have to sniff fields at runtime.

use serde::{Deserialize, Serialize};

use crate::PersonaId;

/// One player's life statistics, independent of the source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeStats {
    pub persona_id: PersonaId,
    pub kills: u64,
    pub deaths: u64,
    pub wins: u64,
    pub losses: u64,
    pub seconds_played: u64,
    /// Fraction of shots that hit, 0.0–1.0.
    pub accuracy: f64,
    pub headshots: u64,
}

impl LifeStats {
    /// Kills per death. Deaths of zero count as one.
    pub fn kd(&self) -> f64 {
        self.kills as f64 / self.deaths.max(1) as f64
    }

    /// Kills per minute played.
    pub fn kpm(&self) -> f64 {
        if self.seconds_played == 0 {
            return 0.0;
        }
        self.kills as f64 / (self.seconds_played as f64 / 60.0)
    }

    /// Fraction of finished rounds that were won.
    pub fn win_rate(&self) -> f64 {
        let rounds = self.wins + self.losses;
        if rounds == 0 {
            return 0.0;
        }
        self.wins as f64 / rounds as f64
    }

    /// Adapter for the career summary shape.
    pub fn from_career(payload: CareerPayload) -> Self {
        Self {
            persona_id: PersonaId(payload.persona_id),
            kills: payload.kills,
            deaths: payload.deaths,
            wins: payload.wins,
            losses: payload.losses,
            seconds_played: payload.time_played_secs,
            accuracy: payload.accuracy_pct / 100.0,
            headshots: payload.headshots,
        }
    }

    /// Adapter for the per-season shape. Seasons are summed, saturating
    /// at `u64::MAX`.
    pub fn from_season(payload: SeasonPayload) -> Self {
        let mut stats = Self {
            persona_id: PersonaId(payload.persona_id),
            kills: 0,
            deaths: 0,
            wins: 0,
            losses: 0,
            seconds_played: 0,
            accuracy: 0.0,
            headshots: 0,
        };
        let mut shots_fired = 0u64;
        let mut shots_hit = 0u64;
        for season in &payload.seasons {
            stats.kills = stats.kills.saturating_add(season.kills);
            stats.deaths = stats.deaths.saturating_add(season.deaths);
            stats.wins = stats.wins.saturating_add(season.wins);
            stats.losses = stats.losses.saturating_add(season.losses);
            stats.seconds_played = stats
                .seconds_played
                .saturating_add(season.minutes_played.saturating_mul(60));
            stats.headshots = stats.headshots.saturating_add(season.headshots);
            shots_fired = shots_fired.saturating_add(season.shots_fired);
            shots_hit = shots_hit.saturating_add(season.shots_hit);
        }
        if shots_fired > 0 {
            stats.accuracy = shots_hit as f64 / shots_fired as f64;
        }
        stats
    }

    /// Adapter for the legacy shape, which reports a ratio instead of
    /// raw deaths and rounds instead of wins/losses.
    pub fn from_legacy(payload: LegacyPayload) -> Self {
        let deaths = if payload.kd_ratio > 0.0 {
            (payload.kills as f64 / payload.kd_ratio).round() as u64
        } else {
            0
        };
        Self {
            persona_id: PersonaId(payload.id),
            kills: payload.kills,
            deaths,
            wins: payload.rounds_won,
            losses: payload.rounds_played.saturating_sub(payload.rounds_won),
            seconds_played: (payload.hours_played * 3600.0) as u64,
            accuracy: payload.accuracy,
            headshots: payload.headshots,
        }
    }
}

/// Career summary payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CareerPayload {
    pub persona_id: u64,
    pub kills: u64,
    pub deaths: u64,
    pub wins: u64,
    pub losses: u64,
    pub time_played_secs: u64,
    /// 0–100.
    pub accuracy_pct: f64,
    #[serde(default)]
    pub headshots: u64,
}

/// Per-season payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonPayload {
    pub persona_id: u64,
    pub seasons: Vec<SeasonEntry>,
}

/// One season inside a [`SeasonPayload`].
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonEntry {
    pub kills: u64,
    pub deaths: u64,
    pub wins: u64,
    pub losses: u64,
    pub minutes_played: u64,
    #[serde(default)]
    pub headshots: u64,
    #[serde(default)]
    pub shots_fired: u64,
    #[serde(default)]
    pub shots_hit: u64,
}

/// Legacy payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyPayload {
    pub id: u64,
    pub kills: u64,
    #[serde(rename = "kd")]
    pub kd_ratio: f64,
    pub rounds_played: u64,
    pub rounds_won: u64,
    pub hours_played: f64,
    /// 0.0–1.0.
    pub accuracy: f64,
    #[serde(default)]
    pub headshots: u64,
}

/// Decodes a JSON payload into one of the payload types above.
#[cfg(feature = "json")]
pub fn decode_payload<T: serde::de::DeserializeOwned>(
    data: &[u8],
) -> Result<T, crate::ProtocolError> {
    serde_json::from_slice(data).map_err(crate::ProtocolError::Decode)
}
