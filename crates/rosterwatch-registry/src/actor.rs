//! Session actor: an isolated Tokio task that owns one [`ServerSession`].
//!
//! All updates for a session go through its bounded command channel, so
//! they are applied strictly in poll order and never touch another
//! session's state. The effects an update produces are handed to the
//! session's effect worker, a second task that runs them in order. A slow
//! collaborator delays that session's effects, never its reconciliation
//! or anyone's polling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rosterwatch_protocol::{Player, RosterSnapshot, ServerConfig, SessionId};
use rosterwatch_session::{
    Announcement, CongestionAlert, CongestionDetector, Effect, ServerSession, SessionError,
    SessionInfo, UpdateContext, UpdateOutcome,
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::collab::Collaborators;
use crate::driver::{bounded, EffectDriver};
use crate::RegistryError;

/// Source of "now" for session actors.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Reply channel for callers that wait on the reconciliation result.
pub(crate) type UpdateReply = oneshot::Sender<Result<UpdateOutcome, SessionError>>;

pub(crate) enum SessionCommand {
    /// Apply one poll.
    Update {
        map_name: String,
        map_mode: String,
        snapshot: RosterSnapshot,
        config: ServerConfig,
        /// Answered as soon as the roster is reconciled, before effects run.
        reply: Option<UpdateReply>,
    },

    /// Run the close procedure and stop. Answered once the close
    /// effects have run.
    Close { reply: oneshot::Sender<()> },

    /// Answered once every effect queued so far has run.
    Flush { reply: oneshot::Sender<()> },

    Info { reply: oneshot::Sender<SessionInfo> },

    /// Case-insensitive lookup across all partitions.
    FindPlayer {
        name: String,
        reply: oneshot::Sender<Option<Player>>,
    },

    Names { reply: oneshot::Sender<Vec<String>> },

    RecentLog {
        count: usize,
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Work for a session's effect worker.
enum EffectJob {
    Run {
        server: ServerConfig,
        effects: Vec<Effect>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Where a session's congestion detector lives.
pub(crate) enum DetectorSlot {
    Owned(CongestionDetector),
    Shared(Arc<Mutex<CongestionDetector>>),
}

/// Handle to a running session actor.
///
/// Cheap to clone; the registry keeps one per session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
    query_timeout: Duration,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Queues a poll without waiting. A full channel drops the poll with
    /// [`RegistryError::Backlogged`].
    pub(crate) fn update(
        &self,
        map_name: &str,
        map_mode: &str,
        snapshot: RosterSnapshot,
        config: ServerConfig,
        reply: Option<UpdateReply>,
    ) -> Result<(), RegistryError> {
        let command = SessionCommand::Update {
            map_name: map_name.to_string(),
            map_mode: map_mode.to_string(),
            snapshot,
            config,
            reply,
        };
        match self.sender.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id = %self.session_id, "session backlogged, poll dropped");
                Err(RegistryError::Backlogged(self.session_id))
            }
            Err(TrySendError::Closed(_)) => Err(RegistryError::Unavailable(self.session_id)),
        }
    }

    /// Runs the close procedure and waits, up to the query timeout, for
    /// its effects to finish.
    pub(crate) async fn close(&self) -> Result<(), RegistryError> {
        self.request(|reply| SessionCommand::Close { reply }).await
    }

    /// Waits, up to the query timeout, until every effect queued so far
    /// has run.
    pub async fn flush(&self) -> Result<(), RegistryError> {
        self.request(|reply| SessionCommand::Flush { reply }).await
    }

    /// Current session summary, answered after every update queued before it.
    pub async fn info(&self) -> Result<SessionInfo, RegistryError> {
        self.request(|reply| SessionCommand::Info { reply }).await
    }

    pub async fn find_player(&self, name: &str) -> Result<Option<Player>, RegistryError> {
        let name = name.to_string();
        self.request(|reply| SessionCommand::FindPlayer { name, reply })
            .await
    }

    pub async fn names(&self) -> Result<Vec<String>, RegistryError> {
        self.request(|reply| SessionCommand::Names { reply }).await
    }

    pub async fn recent_log(&self, count: usize) -> Result<Vec<String>, RegistryError> {
        self.request(|reply| SessionCommand::RecentLog { count, reply })
            .await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let exchange = async {
            self.sender
                .send(command(reply_tx))
                .await
                .map_err(|_| RegistryError::Unavailable(self.session_id))?;
            reply_rx
                .await
                .map_err(|_| RegistryError::Unavailable(self.session_id))
        };
        tokio::time::timeout(self.query_timeout, exchange)
            .await
            .unwrap_or(Err(RegistryError::Timeout(self.session_id)))
    }
}

struct SessionActor {
    session: ServerSession,
    detector: DetectorSlot,
    collab: Collaborators,
    effects: mpsc::UnboundedSender<EffectJob>,
    call_timeout: Duration,
    clock: Clock,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    async fn run(mut self) {
        let session_id = self.session.session_id();
        tracing::info!(%session_id, server = %self.session.config().name, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Update {
                    map_name,
                    map_mode,
                    snapshot,
                    config,
                    reply,
                } => {
                    self.handle_update(&map_name, &map_mode, snapshot, config, reply)
                        .await;
                }
                SessionCommand::Close { reply } => {
                    let effects = self.session.close();
                    let server = self.session.config().clone();
                    self.queue_effects(server, effects);
                    let _ = self.effects.send(EffectJob::Flush { reply });
                    tracing::info!(%session_id, "session closed");
                    break;
                }
                SessionCommand::Flush { reply } => {
                    let _ = self.effects.send(EffectJob::Flush { reply });
                }
                SessionCommand::Info { reply } => {
                    let _ = reply.send(self.session.info());
                }
                SessionCommand::FindPlayer { name, reply } => {
                    let found = self.session.roster().find_by_name(&name).cloned();
                    let _ = reply.send(found);
                }
                SessionCommand::Names { reply } => {
                    let _ = reply.send(self.session.roster().names());
                }
                SessionCommand::RecentLog { count, reply } => {
                    let _ = reply.send(self.session.recent_log(count));
                }
            }
        }

        tracing::info!(%session_id, "session actor stopped");
    }

    async fn handle_update(
        &mut self,
        map_name: &str,
        map_mode: &str,
        snapshot: RosterSnapshot,
        config: ServerConfig,
        reply: Option<UpdateReply>,
    ) {
        let session_id = self.session.session_id();
        if self.session.config() != &config {
            tracing::debug!(%session_id, server = %config.name, "server config changed");
            self.session.set_config(config);
        }

        let ctx = self.context().await;
        let mut outcome = match self.session.update(map_name, map_mode, snapshot, &ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "roster update rejected");
                if let Some(reply) = reply {
                    let _ = reply.send(Err(e));
                }
                return;
            }
        };

        let server = self.session.config().clone();
        if let Some(alert) = self.check_congestion(&server, ctx.now).await {
            outcome
                .effects
                .push(Effect::Announce(Announcement::Congestion(alert)));
        }

        let effects = match reply {
            Some(reply) => {
                let effects = outcome.effects.clone();
                let _ = reply.send(Ok(outcome));
                effects
            }
            None => outcome.effects,
        };
        self.queue_effects(server, effects);
    }

    fn queue_effects(&self, server: ServerConfig, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        if self.effects.send(EffectJob::Run { server, effects }).is_err() {
            tracing::error!(
                session_id = %self.session.session_id(),
                "effect worker gone, effects dropped"
            );
        }
    }

    /// Prefetches the external facts an update needs. A failed or slow
    /// fetch is logged and treated as empty.
    async fn context(&self) -> UpdateContext {
        let session_id = self.session.session_id();
        let limit = self.call_timeout;
        let (bots, warmed, community) = tokio::join!(
            bounded(limit, self.collab.bots.known_bot_names()),
            bounded(limit, self.collab.warm_ledger.warmed_names()),
            bounded(limit, self.collab.community.members()),
        );

        let mut ctx = UpdateContext::at((self.clock)());
        match bots {
            Ok(names) => ctx.bot_names = names,
            Err(error) => tracing::warn!(%session_id, %error, "bot roster unavailable"),
        }
        match warmed {
            Ok(names) => ctx.warmed_names = names,
            Err(error) => tracing::warn!(%session_id, %error, "warm ledger unavailable"),
        }
        match community {
            Ok(members) => ctx.community = members,
            Err(error) => tracing::warn!(%session_id, %error, "community directory unavailable"),
        }
        ctx
    }

    async fn check_congestion(
        &mut self,
        server: &ServerConfig,
        now: DateTime<Utc>,
    ) -> Option<CongestionAlert> {
        let session_id = self.session.session_id();
        let roster = self.session.roster();
        match &mut self.detector {
            DetectorSlot::Owned(detector) => detector.check_roster(server, roster, session_id, now),
            DetectorSlot::Shared(shared) => {
                shared
                    .lock()
                    .await
                    .check_roster(server, roster, session_id, now)
            }
        }
    }
}

/// Runs effect batches in the order they were queued. Exits once the
/// actor has stopped and the queue is drained.
async fn run_effects(
    session_id: SessionId,
    driver: EffectDriver,
    mut jobs: mpsc::UnboundedReceiver<EffectJob>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            EffectJob::Run { server, effects } => {
                driver.execute(session_id, &server, effects).await;
            }
            EffectJob::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }
    tracing::debug!(%session_id, "effect worker stopped");
}

/// Everything a new session actor needs besides its id and server.
pub(crate) struct SessionSetup {
    pub(crate) detector: DetectorSlot,
    pub(crate) collab: Collaborators,
    pub(crate) driver: EffectDriver,
    pub(crate) clock: Clock,
    pub(crate) channel_size: usize,
    pub(crate) call_timeout: Duration,
    pub(crate) query_timeout: Duration,
}

/// Spawns a session actor and its effect worker, and returns the handle.
pub(crate) fn spawn_session(
    session_id: SessionId,
    config: ServerConfig,
    setup: SessionSetup,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(setup.channel_size);
    let (effects_tx, effects_rx) = mpsc::unbounded_channel();

    let actor = SessionActor {
        session: ServerSession::new(session_id, config),
        detector: setup.detector,
        collab: setup.collab,
        effects: effects_tx,
        call_timeout: setup.call_timeout,
        clock: setup.clock,
        receiver: rx,
    };

    tokio::spawn(run_effects(session_id, setup.driver, effects_rx));
    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
        query_timeout: setup.query_timeout,
    }
}
