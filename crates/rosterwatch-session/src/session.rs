//! The per-server reconciler.
//!
//! A [`ServerSession`] holds the last accepted roster of one game
//! instance. Each poll goes through [`ServerSession::update`], which
//! rebuilds players, runs the warm-up machine, diffs the new roster
//! against the old one, and returns the side effects to perform.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rosterwatch_protocol::{
    LogAction, LogEntry, PersonaId, Player, RosterEntry, RosterSnapshot, ServerConfig,
    ServerRoster, SessionId,
};

use crate::effect::{Announcement, Effect};
use crate::warmup::{self, Transition, WarmState};
use crate::SessionError;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// External facts an update needs, fetched by the caller beforehand.
#[derive(Debug, Clone)]
pub struct UpdateContext {
    pub now: DateTime<Utc>,
    /// Names on the known-bot roster.
    pub bot_names: HashSet<String>,
    /// Names on the warm-player ledger.
    pub warmed_names: HashSet<String>,
    /// Recognized community members, by persona, with their nickname.
    pub community: HashMap<PersonaId, String>,
}

impl UpdateContext {
    /// A context with no bots, warmed players, or community members.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            bot_names: HashSet::new(),
            warmed_names: HashSet::new(),
            community: HashMap::new(),
        }
    }
}

/// What one update changed.
#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    /// Non-bot players new to the soldier ∪ spectator population.
    pub joined: Vec<Player>,
    /// Non-bot players gone from the soldier ∪ spectator population.
    pub left: Vec<Player>,
    /// Non-bot players new to the queue.
    pub queue_joined: Vec<Player>,
    /// Non-bot players gone from the queue.
    pub queue_left: Vec<Player>,
    pub transition: Option<Transition>,
    /// Side effects, in execution order.
    pub effects: Vec<Effect>,
}

/// Read-only summary of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub server: String,
    pub map_name: String,
    pub map_mode: String,
    pub warm: WarmState,
    pub soldiers: usize,
    pub human_soldiers: usize,
    pub queue: usize,
    pub spectators: usize,
    pub bots: usize,
    pub log_len: usize,
}

// ---------------------------------------------------------------------------
// ServerSession
// ---------------------------------------------------------------------------

/// Reconciled state of one live game instance.
#[derive(Debug, Clone)]
pub struct ServerSession {
    session_id: SessionId,
    config: ServerConfig,
    map_name: String,
    map_mode: String,
    roster: ServerRoster,
    log: Vec<LogEntry>,
    warm: WarmState,
}

impl ServerSession {
    /// Creates an empty, cold session.
    pub fn new(session_id: SessionId, config: ServerConfig) -> Self {
        Self {
            session_id,
            config,
            map_name: String::new(),
            map_mode: String::new(),
            roster: ServerRoster::default(),
            log: Vec::new(),
            warm: WarmState::Cold,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn roster(&self) -> &ServerRoster {
        &self.roster
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn warm_state(&self) -> WarmState {
        self.warm
    }

    pub fn is_warm(&self) -> bool {
        self.warm.is_warm()
    }

    /// Replaces the server config, e.g. after a configuration reload.
    pub fn set_config(&mut self, config: ServerConfig) {
        self.config = config;
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id,
            server: self.config.name.clone(),
            map_name: self.map_name.clone(),
            map_mode: self.map_mode.clone(),
            warm: self.warm,
            soldiers: self.roster.soldiers.len(),
            human_soldiers: self.roster.human_soldier_count(),
            queue: self.roster.queue.len(),
            spectators: self.roster.spectators.len(),
            bots: self.roster.bots.len(),
            log_len: self.log.len(),
        }
    }

    /// The last `count` log entries, oldest first, formatted for display.
    pub fn recent_log(&self, count: usize) -> Vec<String> {
        let start = self.log.len().saturating_sub(count);
        self.log[start..].iter().map(ToString::to_string).collect()
    }

    /// Applies one poll.
    ///
    /// On error the session is left untouched.
    pub fn update(
        &mut self,
        map_name: &str,
        map_mode: &str,
        snapshot: RosterSnapshot,
        ctx: &UpdateContext,
    ) -> Result<UpdateOutcome, SessionError> {
        if let Some(persona_id) = snapshot.overlapping_persona() {
            return Err(SessionError::InvariantViolation {
                session_id: self.session_id,
                reason: format!("{persona_id} appears in more than one roster slot"),
            });
        }

        let now = ctx.now;
        let mut next = self.rebuild(snapshot, ctx);
        // Bots are tracked from the raw roster; the warm-up machine never
        // touches this list.
        let bots: Vec<Player> = next.soldiers.iter().filter(|p| p.is_bot).cloned().collect();

        let mut outcome = UpdateOutcome::default();

        // Warm-up machine.
        let human_soldiers = next.human_soldier_count();
        if let Some(target) = self.warm.next(human_soldiers, &self.config) {
            self.warm = target;
            let transition = match target {
                WarmState::Warm => {
                    let warmed = warmup::grant_warm(&mut next, self.config.warm_capacity);
                    tracing::info!(
                        session_id = %self.session_id,
                        server = %self.config.name,
                        population = human_soldiers,
                        warmed = warmed.len(),
                        "session went warm"
                    );
                    outcome.effects.push(Effect::RecordWarmed {
                        players: warmed.clone(),
                    });
                    for player in &warmed {
                        outcome.effects.push(Effect::ClearTemporaryBan {
                            player: player.clone(),
                        });
                    }
                    outcome.effects.push(Effect::Announce(Announcement::WarmSuccess {
                        server: self.config.name.clone(),
                        warmed: warmed.iter().map(|p| p.name.clone()).collect(),
                        population: human_soldiers,
                    }));
                    Transition::WentWarm { warmed }
                }
                WarmState::Cold => {
                    let reset = warmup::reset_warm(&mut next, now);
                    tracing::info!(
                        session_id = %self.session_id,
                        server = %self.config.name,
                        population = human_soldiers,
                        "session went cold"
                    );
                    outcome.effects.push(Effect::Announce(Announcement::WentCold {
                        server: self.config.name.clone(),
                        population: human_soldiers,
                    }));
                    Transition::WentCold { reset }
                }
            };
            outcome.transition = Some(transition);
        }

        // Diffs by persona id, bots excluded.
        let (joined, left) = diff(
            self.roster.soldiers.iter().chain(self.roster.spectators.iter()),
            next.soldiers.iter().chain(next.spectators.iter()),
        );
        let (queue_joined, queue_left) = diff(self.roster.queue.iter(), next.queue.iter());

        // Both diffs drive the join and leave procedures. A player who only
        // moved between partitions is screened again but keeps presence,
        // cached stats and settlement as they were.
        let previously_present: HashSet<PersonaId> =
            self.roster.all_players().map(|p| p.persona_id).collect();
        let still_present: HashSet<PersonaId> = next.all_players().map(|p| p.persona_id).collect();
        let arrivals: Vec<Player> = joined.iter().chain(queue_joined.iter()).cloned().collect();
        let departures: Vec<Player> = left.iter().chain(queue_left.iter()).cloned().collect();

        next.bots = bots;
        self.roster = next;
        self.map_name = map_name.to_string();
        self.map_mode = map_mode.to_string();

        outcome.effects.push(Effect::Autosay {
            roster: self.roster.clone(),
            is_warm: self.is_warm(),
        });

        if !arrivals.is_empty() {
            self.join_effects(
                &arrivals,
                &previously_present,
                human_soldiers,
                ctx,
                &mut outcome.effects,
            );
        }
        if !departures.is_empty() {
            leave_effects(&departures, &still_present, &mut outcome.effects);
        }

        for player in &arrivals {
            self.log.push(LogEntry::new(player, LogAction::Join, now));
        }
        for player in &departures {
            self.log.push(LogEntry::new(player, LogAction::Leave, now));
        }

        tracing::debug!(
            session_id = %self.session_id,
            joined = joined.len(),
            left = left.len(),
            queue_joined = queue_joined.len(),
            queue_left = queue_left.len(),
            warm = %self.warm,
            "roster reconciled"
        );

        outcome.joined = joined;
        outcome.left = left;
        outcome.queue_joined = queue_joined;
        outcome.queue_left = queue_left;
        Ok(outcome)
    }

    /// Effects for an explicit server close: drop cached stats and
    /// presence for everyone still listed. No settlement.
    pub fn close(&self) -> Vec<Effect> {
        let mut effects = Vec::new();
        for player in self.roster.all_players() {
            effects.push(Effect::EvictLifeStats {
                persona_id: player.persona_id,
            });
            effects.push(Effect::ClearInGame {
                player: player.clone(),
            });
        }
        effects
    }

    /// Builds the next roster from a snapshot, carrying per-persona
    /// timestamps and warm status over from the current roster.
    fn rebuild(&self, snapshot: RosterSnapshot, ctx: &UpdateContext) -> ServerRoster {
        let previous: HashMap<PersonaId, &Player> =
            self.roster.all_players().map(|p| (p.persona_id, p)).collect();

        let build = |entries: &[RosterEntry]| -> Vec<Player> {
            entries
                .iter()
                .map(|entry| {
                    let mut player = Player::from_entry(entry, ctx.now);
                    match previous.get(&entry.persona_id) {
                        Some(prev) => {
                            player.joined_at = prev.joined_at;
                            player.warm_since = prev.warm_since;
                            player.is_warmed = prev.is_warmed;
                        }
                        None => {
                            player.is_warmed = ctx.warmed_names.contains(&entry.name);
                        }
                    }
                    player.is_bot = ctx.bot_names.contains(&entry.name);
                    player
                })
                .collect()
        };

        let soldiers = build(&snapshot.soldiers);
        let queue = build(&snapshot.queue);
        let spectators = match snapshot.spectators {
            Some(entries) => build(&entries),
            None => {
                // Stale spectator list: keep it, minus anyone who has since
                // taken a slot or joined the queue.
                let seated: HashSet<PersonaId> = soldiers
                    .iter()
                    .chain(queue.iter())
                    .map(|p| p.persona_id)
                    .collect();
                self.roster
                    .spectators
                    .iter()
                    .filter(|p| !seated.contains(&p.persona_id))
                    .cloned()
                    .collect()
            }
        };

        ServerRoster {
            soldiers,
            queue,
            spectators,
            bots: Vec::new(),
        }
    }

    fn join_effects(
        &self,
        arrivals: &[Player],
        previously_present: &HashSet<PersonaId>,
        human_soldiers: usize,
        ctx: &UpdateContext,
        effects: &mut Vec<Effect>,
    ) {
        for player in arrivals {
            effects.push(Effect::Screen {
                player: player.clone(),
                session_warm: self.is_warm(),
            });
        }
        effects.push(Effect::LifeStatsCheck {
            players: arrivals.to_vec(),
        });
        effects.push(Effect::AnomalyCheck {
            players: arrivals.to_vec(),
        });
        for player in arrivals
            .iter()
            .filter(|p| !previously_present.contains(&p.persona_id))
        {
            effects.push(Effect::MarkInGame {
                player: player.clone(),
            });
        }

        if !self.is_warm() && human_soldiers <= self.config.warm_threshold {
            let members: Vec<String> = arrivals
                .iter()
                .filter_map(|p| ctx.community.get(&p.persona_id).cloned())
                .collect();
            if !members.is_empty() {
                effects.push(Effect::Announce(Announcement::WarmingUp {
                    server: self.config.name.clone(),
                    members,
                    population: human_soldiers,
                }));
            }
        }
    }
}

/// Leave procedure for players gone from the whole session. Partition
/// moves only get a log entry.
fn leave_effects(
    departures: &[Player],
    still_present: &HashSet<PersonaId>,
    effects: &mut Vec<Effect>,
) {
    for player in departures
        .iter()
        .filter(|p| !still_present.contains(&p.persona_id))
    {
        effects.push(Effect::EvictLifeStats {
            persona_id: player.persona_id,
        });
        effects.push(Effect::ClearInGame {
            player: player.clone(),
        });
        effects.push(Effect::Settle {
            player: player.clone(),
        });
    }
}

/// Splits two populations into (arrived, departed), matching by persona
/// id and ignoring bots. Output follows input order.
fn diff<'a>(
    old: impl Iterator<Item = &'a Player>,
    new: impl Iterator<Item = &'a Player>,
) -> (Vec<Player>, Vec<Player>) {
    let old: Vec<&Player> = old.filter(|p| !p.is_bot).collect();
    let new: Vec<&Player> = new.filter(|p| !p.is_bot).collect();
    let old_ids: HashSet<PersonaId> = old.iter().map(|p| p.persona_id).collect();
    let new_ids: HashSet<PersonaId> = new.iter().map(|p| p.persona_id).collect();

    let joined = new
        .iter()
        .filter(|p| !old_ids.contains(&p.persona_id))
        .map(|p| (*p).clone())
        .collect();
    let left = old
        .iter()
        .filter(|p| !new_ids.contains(&p.persona_id))
        .map(|p| (*p).clone())
        .collect();
    (joined, left)
}
