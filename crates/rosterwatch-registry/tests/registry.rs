//! Integration tests for the registry using recording collaborators.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rosterwatch_protocol::{
    LifeStats, PersonaId, Player, RosterEntry, RosterSnapshot, ServerConfig, ServerRoster,
    SessionId, Team,
};
use rosterwatch_registry::{
    Autosay, BanKind, BlacklistRecord, BlacklistStore, BotRoster, Clock, CollabError,
    Collaborators, CongestionScope, EnforcementChecks, GameAdmin, LifeStatsCache,
    MemoryBlacklist, MemoryLifeStats, MemoryWarmLedger, Messenger, Presence, Registry,
    RegistryConfig, RegistryError, SettlementQueue, TempBlacklistScope, WarmPlayerLedger,
    SYSTEM_ADMIN,
};
use rosterwatch_session::SessionError;

// =========================================================================
// Recording collaborator
// =========================================================================

/// Records every outward call as a line of text.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, line: String) {
        self.calls.lock().unwrap().push(line);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl GameAdmin for Recorder {
    async fn kick(
        &self,
        _session_id: SessionId,
        player: &Player,
        reason: &str,
        admin: &str,
    ) -> Result<(), CollabError> {
        self.push(format!("kick {} {reason} by {admin}", player.name));
        Ok(())
    }

    async fn ban(
        &self,
        _session_id: SessionId,
        player: &Player,
        reason: &str,
        admin: &str,
    ) -> Result<(), CollabError> {
        self.push(format!("ban {} {reason} by {admin}", player.name));
        Ok(())
    }
}

#[async_trait]
impl Messenger for Recorder {
    async fn notify(
        &self,
        group_id: i64,
        text: &str,
        _reply_to: Option<i64>,
        _mention: Option<i64>,
    ) -> Result<(), CollabError> {
        self.push(format!("notify {group_id} {text}"));
        Ok(())
    }
}

#[async_trait]
impl Presence for Recorder {
    async fn mark_in_game(&self, player: &Player, server: &str) -> Result<(), CollabError> {
        self.push(format!("mark {} {server}", player.name));
        Ok(())
    }

    async fn clear_in_game(&self, player: &Player) -> Result<(), CollabError> {
        self.push(format!("clear {}", player.name));
        Ok(())
    }
}

#[async_trait]
impl SettlementQueue for Recorder {
    async fn enqueue(
        &self,
        _session_id: SessionId,
        _server: &ServerConfig,
        player: &Player,
    ) -> Result<(), CollabError> {
        self.push(format!("settle {}", player.name));
        Ok(())
    }
}

#[async_trait]
impl EnforcementChecks for Recorder {
    async fn life_stats(
        &self,
        _session_id: SessionId,
        _server: &ServerConfig,
        players: &[Player],
    ) -> Result<(), CollabError> {
        self.push(format!("life_stats {}", players.len()));
        Ok(())
    }

    async fn weapon_anomaly(
        &self,
        _session_id: SessionId,
        _server: &ServerConfig,
        players: &[Player],
    ) -> Result<(), CollabError> {
        self.push(format!("anomaly {}", players.len()));
        Ok(())
    }
}

#[async_trait]
impl Autosay for Recorder {
    async fn on_roster(
        &self,
        _session_id: SessionId,
        _server: &ServerConfig,
        roster: &ServerRoster,
        is_warm: bool,
    ) -> Result<(), CollabError> {
        self.push(format!("autosay {} {is_warm}", roster.soldiers.len()));
        Ok(())
    }
}

/// Bot roster with a fixed name list.
struct Bots(HashSet<String>);

#[async_trait]
impl BotRoster for Bots {
    async fn known_bot_names(&self) -> Result<HashSet<String>, CollabError> {
        Ok(self.0.clone())
    }
}

/// A blacklist whose backend is down.
struct BrokenBlacklist;

#[async_trait]
impl BlacklistStore for BrokenBlacklist {
    async fn permanent(&self, _: PersonaId) -> Result<Option<BlacklistRecord>, CollabError> {
        Err(CollabError::Network("timeout".into()))
    }
    async fn temporary(&self, _: PersonaId) -> Result<Option<BlacklistRecord>, CollabError> {
        Err(CollabError::Network("timeout".into()))
    }
    async fn clear_temporary(&self, _: PersonaId) -> Result<(), CollabError> {
        Err(CollabError::Network("timeout".into()))
    }
    async fn add(&self, _: BlacklistRecord) -> Result<(), CollabError> {
        Err(CollabError::Network("timeout".into()))
    }
    async fn remove(&self, _: BanKind, _: PersonaId) -> Result<bool, CollabError> {
        Err(CollabError::Network("timeout".into()))
    }
    async fn list(&self, _: BanKind) -> Result<Vec<BlacklistRecord>, CollabError> {
        Err(CollabError::Network("timeout".into()))
    }
}

/// An admin backend that accepts requests and never answers.
struct HungAdmin;

#[async_trait]
impl GameAdmin for HungAdmin {
    async fn kick(&self, _: SessionId, _: &Player, _: &str, _: &str) -> Result<(), CollabError> {
        std::future::pending().await
    }

    async fn ban(&self, _: SessionId, _: &Player, _: &str, _: &str) -> Result<(), CollabError> {
        std::future::pending().await
    }
}

/// A bot roster that never answers.
struct HungBots;

#[async_trait]
impl BotRoster for HungBots {
    async fn known_bot_names(&self) -> Result<HashSet<String>, CollabError> {
        std::future::pending().await
    }
}

// =========================================================================
// Harness
// =========================================================================

struct Harness {
    registry: Registry,
    recorder: Arc<Recorder>,
    blacklist: Arc<MemoryBlacklist>,
    life_stats: Arc<MemoryLifeStats>,
    ledger: Arc<MemoryWarmLedger>,
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl Harness {
    fn new(config: RegistryConfig) -> Self {
        Self::build(config, |c| c)
    }

    fn build(config: RegistryConfig, tweak: impl FnOnce(Collaborators) -> Collaborators) -> Self {
        let recorder = Arc::new(Recorder::default());
        let blacklist = Arc::new(MemoryBlacklist::new());
        let life_stats = Arc::new(MemoryLifeStats::new());
        let ledger = Arc::new(MemoryWarmLedger::new());
        let collab = Collaborators {
            blacklist: blacklist.clone(),
            life_stats: life_stats.clone(),
            warm_ledger: ledger.clone(),
            admin: recorder.clone(),
            messenger: recorder.clone(),
            presence: recorder.clone(),
            settlement: recorder.clone(),
            enforcement: recorder.clone(),
            autosay: recorder.clone(),
            ..Collaborators::default()
        };

        let now = Arc::new(Mutex::new(t0()));
        let clock_now = Arc::clone(&now);
        let clock: Clock = Arc::new(move || *clock_now.lock().unwrap());

        Self {
            registry: Registry::with_clock(config, tweak(collab), clock),
            recorder,
            blacklist,
            life_stats,
            ledger,
            now,
        }
    }

    fn advance(&self, delta: TimeDelta) {
        *self.now.lock().unwrap() += delta;
    }

    /// Upserts and waits until the session has finished the update's effects.
    async fn poll(&self, session: u64, server: &ServerConfig, snapshot: RosterSnapshot) {
        self.registry
            .upsert(SessionId(session), "map", "conquest", snapshot, server.clone())
            .await
            .unwrap();
        self.registry.flush(SessionId(session)).await.unwrap();
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
}

fn server(name: &str) -> ServerConfig {
    ServerConfig {
        group_id: 100,
        warm_threshold: 30,
        warm_capacity: 40,
        ..ServerConfig::named(name)
    }
}

fn entry(name: &str, id: u64, team: Team) -> RosterEntry {
    RosterEntry::new(name, id, team)
}

fn soldiers(count: u64, first_id: u64) -> Vec<RosterEntry> {
    (0..count)
        .map(|i| {
            let id = first_id + i;
            let team = if i % 2 == 0 { Team::TeamOne } else { Team::TeamTwo };
            entry(&format!("s{id}"), id, team)
        })
        .collect()
}

fn snapshot(soldiers: Vec<RosterEntry>) -> RosterSnapshot {
    RosterSnapshot {
        soldiers,
        queue: Vec::new(),
        spectators: Some(Vec::new()),
    }
}

fn ban_record(id: u64, name: &str, kind: BanKind) -> BlacklistRecord {
    BlacklistRecord {
        persona_id: PersonaId(id),
        name: name.into(),
        kind,
        category: "ping".into(),
        reason: "cheating".into(),
        admin: "alice".into(),
        added_at: t0(),
    }
}

fn stats(id: u64) -> LifeStats {
    LifeStats {
        persona_id: PersonaId(id),
        kills: 100,
        deaths: 50,
        wins: 3,
        losses: 2,
        seconds_played: 3_600,
        accuracy: 0.2,
        headshots: 10,
    }
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_upsert_empty_roster_creates_no_session() {
    let h = Harness::new(RegistryConfig::default());
    h.registry
        .upsert(SessionId(1), "map", "conquest", RosterSnapshot::default(), server("alpha"))
        .await
        .unwrap();

    assert!(h.registry.is_empty().await);
    assert!(h.registry.session_info(SessionId(1)).await.is_none());
}

#[tokio::test]
async fn test_upsert_creates_session_and_applies_in_order() {
    let h = Harness::new(RegistryConfig::default());
    let alpha = server("alpha");

    for count in [3, 5, 2] {
        h.registry
            .upsert(SessionId(1), "map", "conquest", snapshot(soldiers(count, 1)), alpha.clone())
            .await
            .unwrap();
    }

    let info = h.registry.session_info(SessionId(1)).await.unwrap();
    assert_eq!(info.soldiers, 2);
    assert_eq!(info.server, "alpha");
    // 5 joins, then 3 leaves.
    assert_eq!(info.log_len, 8);
    assert_eq!(h.registry.len().await, 1);
}

#[tokio::test]
async fn test_upsert_empty_roster_for_existing_session_empties_it() {
    let h = Harness::new(RegistryConfig::default());
    let alpha = server("alpha");
    h.poll(1, &alpha, snapshot(soldiers(2, 1))).await;
    h.poll(1, &alpha, RosterSnapshot::default()).await;

    let info = h.registry.session_info(SessionId(1)).await.unwrap();
    assert_eq!(info.soldiers, 0);
    assert_eq!(h.recorder.with_prefix("settle").len(), 2);
}

#[tokio::test]
async fn test_close_removes_session_and_evicts_without_settling() {
    let h = Harness::new(RegistryConfig::default());
    let alpha = server("alpha");
    h.poll(1, &alpha, snapshot(soldiers(2, 1))).await;
    h.life_stats.insert(stats(1)).await;

    h.registry.close(SessionId(1)).await.unwrap();

    assert!(h.registry.is_empty().await);
    assert!(h.registry.find_player("s1").await.is_none());
    assert_eq!(h.life_stats.get(PersonaId(1)).await, None);
    assert_eq!(h.recorder.with_prefix("clear").len(), 2);
    assert!(h.recorder.with_prefix("settle").is_empty());
}

#[tokio::test]
async fn test_close_unknown_session_is_noop() {
    let h = Harness::new(RegistryConfig::default());
    h.registry.close(SessionId(404)).await.unwrap();
}

#[tokio::test]
async fn test_reconcile_rejects_overlapping_partitions() {
    let h = Harness::new(RegistryConfig::default());
    let alpha = server("alpha");
    h.poll(1, &alpha, snapshot(soldiers(2, 1))).await;

    let mut bad = snapshot(soldiers(2, 1));
    bad.queue = vec![entry("s1", 1, Team::Queue)];
    let err = h
        .registry
        .reconcile(SessionId(1), "map", "conquest", bad, alpha.clone())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RegistryError::Session(SessionError::InvariantViolation { .. })
    ));
    let info = h.registry.session_info(SessionId(1)).await.unwrap();
    assert_eq!(info.soldiers, 2);
    assert_eq!(info.queue, 0);
}

#[tokio::test]
async fn test_upsert_malformed_first_poll_creates_no_session() {
    let h = Harness::new(RegistryConfig::default());
    let mut bad = snapshot(soldiers(2, 1));
    bad.queue = vec![entry("s1", 1, Team::Queue)];

    let err = h
        .registry
        .upsert(SessionId(1), "map", "conquest", bad, server("alpha"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RegistryError::Session(SessionError::InvariantViolation { .. })
    ));
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_reconcile_reports_diff() {
    let h = Harness::new(RegistryConfig::default());
    let outcome = h
        .registry
        .reconcile(SessionId(1), "map", "conquest", snapshot(soldiers(3, 1)), server("alpha"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.joined.len(), 3);

    let skipped = h
        .registry
        .reconcile(SessionId(2), "map", "conquest", RosterSnapshot::default(), server("beta"))
        .await
        .unwrap();
    assert!(skipped.is_none());
}

// =========================================================================
// Enforcement
// =========================================================================

#[tokio::test]
async fn test_join_permanent_blacklist_bans_and_announces() {
    let h = Harness::new(RegistryConfig::default());
    h.blacklist
        .add(ban_record(9, "mallory", BanKind::Permanent))
        .await
        .unwrap();

    let mut roster = soldiers(2, 1);
    roster.push(entry("mallory", 9, Team::TeamTwo));
    h.poll(1, &server("alpha"), snapshot(roster)).await;

    assert_eq!(
        h.recorder.with_prefix("ban"),
        vec!["ban mallory 本地黑名单[cheating] by alice".to_string()]
    );
    assert!(
        h.recorder
            .with_prefix("notify")
            .iter()
            .any(|n| n.contains("banned mallory"))
    );
}

#[tokio::test]
async fn test_join_temporary_blacklist_ignored_while_cold() {
    let h = Harness::new(RegistryConfig::default());
    h.blacklist
        .add(ban_record(9, "mallory", BanKind::Temporary))
        .await
        .unwrap();

    h.poll(1, &server("alpha"), snapshot(vec![entry("mallory", 9, Team::TeamOne)]))
        .await;

    assert!(h.recorder.with_prefix("kick").is_empty());
}

#[tokio::test]
async fn test_join_temporary_blacklist_kicks_when_warm() {
    let h = Harness::new(RegistryConfig::default());
    let alpha = server("alpha");
    h.poll(1, &alpha, snapshot(soldiers(42, 1))).await;
    assert!(h.registry.session_info(SessionId(1)).await.unwrap().warm.is_warm());

    h.blacklist
        .add(ban_record(99, "mallory", BanKind::Temporary))
        .await
        .unwrap();
    let mut roster = soldiers(42, 1);
    roster.push(entry("mallory", 99, Team::TeamOne));
    h.poll(1, &alpha, snapshot(roster)).await;

    assert_eq!(
        h.recorder.with_prefix("kick"),
        vec![format!("kick mallory ping临时黑名单[cheating] by {SYSTEM_ADMIN}")]
    );
}

#[tokio::test]
async fn test_join_temporary_blacklist_always_scope_kicks_cold() {
    let h = Harness::new(RegistryConfig {
        temp_blacklist_scope: TempBlacklistScope::Always,
        ..RegistryConfig::default()
    });
    h.blacklist
        .add(ban_record(9, "mallory", BanKind::Temporary))
        .await
        .unwrap();

    h.poll(1, &server("alpha"), snapshot(vec![entry("mallory", 9, Team::TeamOne)]))
        .await;

    assert_eq!(h.recorder.with_prefix("kick").len(), 1);
}

#[tokio::test]
async fn test_join_blacklist_failure_skips_check_but_not_siblings() {
    let h = Harness::build(RegistryConfig::default(), |c| Collaborators {
        blacklist: Arc::new(BrokenBlacklist),
        ..c
    });

    h.poll(1, &server("alpha"), snapshot(soldiers(3, 1))).await;

    assert!(h.recorder.with_prefix("ban").is_empty());
    assert_eq!(h.recorder.with_prefix("mark").len(), 3);
    assert_eq!(h.recorder.with_prefix("life_stats"), vec!["life_stats 3"]);
    assert_eq!(h.recorder.with_prefix("anomaly"), vec!["anomaly 3"]);
}

#[tokio::test]
async fn test_join_runs_autosay_before_enforcement() {
    let h = Harness::new(RegistryConfig::default());
    h.poll(1, &server("alpha"), snapshot(soldiers(2, 1))).await;

    let calls = h.recorder.calls();
    assert_eq!(calls[0], "autosay 2 false");
    assert!(calls.contains(&"mark s1 alpha".to_string()));
}

#[tokio::test]
async fn test_bots_are_not_screened_or_logged() {
    let h = Harness::build(RegistryConfig::default(), |c| Collaborators {
        bots: Arc::new(Bots(HashSet::from(["s2".to_string()]))),
        ..c
    });
    h.poll(1, &server("alpha"), snapshot(soldiers(3, 1))).await;

    let info = h.registry.session_info(SessionId(1)).await.unwrap();
    assert_eq!(info.bots, 1);
    assert_eq!(info.human_soldiers, 2);
    assert_eq!(info.log_len, 2);
    assert!(!h.recorder.calls().contains(&"mark s2 alpha".to_string()));
}

// =========================================================================
// Leave procedure and warm-up side effects
// =========================================================================

#[tokio::test]
async fn test_leave_evicts_cached_stats_and_settles() {
    let h = Harness::new(RegistryConfig::default());
    let alpha = server("alpha");
    h.poll(1, &alpha, snapshot(soldiers(3, 1))).await;
    h.life_stats.insert(stats(3)).await;
    h.life_stats.insert(stats(1)).await;

    h.poll(1, &alpha, snapshot(soldiers(2, 1))).await;

    assert_eq!(h.life_stats.get(PersonaId(3)).await, None);
    assert!(h.life_stats.get(PersonaId(1)).await.is_some());
    assert_eq!(h.recorder.with_prefix("settle"), vec!["settle s3"]);
    assert_eq!(h.recorder.with_prefix("clear"), vec!["clear s3"]);
}

#[tokio::test]
async fn test_warm_transition_records_ledger_and_clears_temp_ban() {
    let h = Harness::new(RegistryConfig::default());
    let alpha = server("alpha");
    h.poll(1, &alpha, snapshot(soldiers(40, 1))).await;
    h.blacklist
        .add(ban_record(1, "s1", BanKind::Temporary))
        .await
        .unwrap();

    h.advance(TimeDelta::minutes(5));
    h.poll(1, &alpha, snapshot(soldiers(43, 1))).await;

    assert!(h.ledger.warmed_names().await.unwrap().contains("s1"));
    assert_eq!(h.ledger.warmed_on("s1").await.as_deref(), Some("alpha"));
    assert!(h.blacklist.temporary(PersonaId(1)).await.unwrap().is_none());
    assert!(
        h.recorder
            .with_prefix("notify 100")
            .iter()
            .any(|n| n.contains("warm-up complete"))
    );
}

// =========================================================================
// Queries
// =========================================================================

#[tokio::test]
async fn test_find_player_returns_session_and_cached_stats() {
    let h = Harness::new(RegistryConfig::default());
    h.poll(1, &server("alpha"), snapshot(vec![entry("Alice", 1, Team::TeamOne)]))
        .await;
    h.poll(2, &server("beta"), snapshot(vec![entry("Bob", 2, Team::TeamOne)]))
        .await;
    h.life_stats.insert(stats(2)).await;

    let found = h.registry.find_player("bob").await.unwrap();
    assert_eq!(found.player.persona_id, PersonaId(2));
    assert_eq!(found.session_id, SessionId(2));
    assert_eq!(found.server, "beta");
    assert_eq!(found.life_stats, Some(stats(2)));

    let alice = h.registry.find_player("ALICE").await.unwrap();
    assert_eq!(alice.life_stats, None);
    assert!(h.registry.find_player("carol").await.is_none());
}

#[tokio::test]
async fn test_flatten_all_names_spans_sessions() {
    let h = Harness::new(RegistryConfig::default());
    h.poll(1, &server("alpha"), snapshot(soldiers(2, 1))).await;
    let mut beta = snapshot(soldiers(1, 10));
    beta.queue = vec![entry("waiting", 20, Team::Queue)];
    h.poll(2, &server("beta"), beta).await;

    let mut names = h.registry.flatten_all_names().await;
    names.sort();
    assert_eq!(names, vec!["s1", "s10", "s2", "waiting"]);
}

#[tokio::test]
async fn test_recent_log_by_server_name() {
    let h = Harness::new(RegistryConfig::default());
    let alpha = server("alpha");
    h.poll(1, &alpha, snapshot(soldiers(3, 1))).await;
    h.poll(1, &alpha, snapshot(soldiers(2, 1))).await;

    let lines = h.registry.recent_log("ALPHA", 2).await;
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("leave s3"), "{}", lines[1]);
    assert!(h.registry.recent_log("missing", 5).await.is_empty());
}

#[tokio::test]
async fn test_session_ids_lists_live_sessions() {
    let h = Harness::new(RegistryConfig::default());
    h.poll(1, &server("alpha"), snapshot(soldiers(1, 1))).await;
    h.poll(2, &server("beta"), snapshot(soldiers(1, 5))).await;
    h.registry.close(SessionId(1)).await.unwrap();

    assert_eq!(h.registry.session_ids().await, vec![SessionId(2)]);
}

// =========================================================================
// Congestion scoping
// =========================================================================

/// A full team one, a thin team two, and one player stuck in the queue.
fn stuck(first_id: u64) -> RosterSnapshot {
    let mut soldiers: Vec<RosterEntry> = (0..32)
        .map(|i| entry(&format!("a{}", first_id + i), first_id + i, Team::TeamOne))
        .collect();
    soldiers.extend(
        (32..40).map(|i| entry(&format!("b{}", first_id + i), first_id + i, Team::TeamTwo)),
    );
    RosterSnapshot {
        soldiers,
        queue: vec![entry(&format!("q{first_id}"), first_id + 100, Team::Queue)],
        spectators: Some(Vec::new()),
    }
}

async fn congestion_alerts(scope: CongestionScope) -> usize {
    let h = Harness::new(RegistryConfig {
        congestion_scope: scope,
        ..RegistryConfig::default()
    });
    let alpha = server("alpha");
    let beta = server("beta");

    h.poll(1, &alpha, stuck(1000)).await;
    h.poll(2, &beta, stuck(2000)).await;
    h.advance(TimeDelta::minutes(10));
    h.poll(1, &alpha, stuck(1000)).await;
    h.poll(2, &beta, stuck(2000)).await;

    h.recorder
        .with_prefix("notify")
        .iter()
        .filter(|n| n.contains("queue may be stuck"))
        .count()
}

#[tokio::test]
async fn test_congestion_per_session_scope_alerts_each_session() {
    assert_eq!(congestion_alerts(CongestionScope::PerSession).await, 2);
}

#[tokio::test]
async fn test_congestion_global_scope_shares_cooldown() {
    assert_eq!(congestion_alerts(CongestionScope::Global).await, 1);
}

// =========================================================================
// Slow collaborators
// =========================================================================

#[tokio::test]
async fn test_hung_admin_does_not_block_polls_or_queries() {
    let h = Harness::build(
        RegistryConfig {
            channel_size: 2,
            call_timeout: Duration::from_secs(3_600),
            ..RegistryConfig::default()
        },
        |c| Collaborators {
            admin: Arc::new(HungAdmin),
            ..c
        },
    );
    h.blacklist
        .add(ban_record(9, "mallory", BanKind::Permanent))
        .await
        .unwrap();
    let alpha = server("alpha");

    let polls = async {
        for round in 0..10 {
            let mut roster = soldiers(2 + round, 1);
            roster.push(entry("mallory", 9, Team::TeamTwo));
            h.registry
                .upsert(SessionId(1), "map", "conquest", snapshot(roster), alpha.clone())
                .await
                .unwrap();
        }
        h.registry
            .upsert(SessionId(2), "map", "conquest", snapshot(soldiers(1, 50)), server("beta"))
            .await
            .unwrap();
        h.registry.session_info(SessionId(1)).await
    };
    let info = tokio::time::timeout(Duration::from_secs(5), polls)
        .await
        .expect("polling stalled behind a hung ban")
        .unwrap();
    assert_eq!(info.soldiers, 12);

    let mut names = tokio::time::timeout(Duration::from_secs(5), h.registry.flatten_all_names())
        .await
        .expect("queries stalled behind a hung ban");
    names.sort();
    assert!(names.contains(&"mallory".to_string()));
    assert!(names.contains(&"s50".to_string()));
    assert!(h.recorder.with_prefix("notify").iter().all(|n| !n.contains("banned")));
}

#[tokio::test(start_paused = true)]
async fn test_hung_admin_call_times_out_and_later_effects_run() {
    let h = Harness::build(
        RegistryConfig {
            call_timeout: Duration::from_millis(50),
            query_timeout: Duration::from_secs(60),
            ..RegistryConfig::default()
        },
        |c| Collaborators {
            admin: Arc::new(HungAdmin),
            ..c
        },
    );
    h.blacklist
        .add(ban_record(9, "mallory", BanKind::Permanent))
        .await
        .unwrap();

    let mut roster = soldiers(2, 1);
    roster.push(entry("mallory", 9, Team::TeamTwo));
    h.poll(1, &server("alpha"), snapshot(roster)).await;

    // The ban was abandoned, never announced, and did not hold back presence.
    assert!(h.recorder.with_prefix("notify").iter().all(|n| !n.contains("banned")));
    assert_eq!(h.recorder.with_prefix("mark").len(), 3);
    assert_eq!(h.recorder.with_prefix("life_stats"), vec!["life_stats 3"]);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_session_drops_polls_and_is_skipped_by_queries() {
    let h = Harness::build(
        RegistryConfig {
            channel_size: 1,
            call_timeout: Duration::from_secs(3_600),
            query_timeout: Duration::from_millis(100),
            ..RegistryConfig::default()
        },
        |c| Collaborators {
            bots: Arc::new(HungBots),
            ..c
        },
    );
    let alpha = server("alpha");

    let mut backlogged = 0;
    for _ in 0..10 {
        match h
            .registry
            .upsert(SessionId(1), "map", "conquest", snapshot(soldiers(2, 1)), alpha.clone())
            .await
        {
            Ok(()) => {}
            Err(RegistryError::Backlogged(id)) => {
                assert_eq!(id, SessionId(1));
                backlogged += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
        tokio::task::yield_now().await;
    }
    assert!(backlogged >= 8, "only {backlogged} polls dropped");

    assert!(h.registry.flatten_all_names().await.is_empty());
    assert!(h.registry.find_player("s1").await.is_none());
    assert!(h.registry.session_info(SessionId(1)).await.is_none());
    assert!(matches!(
        h.registry.flush(SessionId(1)).await,
        Err(RegistryError::Timeout(_))
    ));
}
