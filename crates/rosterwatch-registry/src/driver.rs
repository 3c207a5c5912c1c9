//! Executes reconciler effects against the collaborators.
//!
//! Every collaborator call is independent and bounded by `call_timeout`:
//! a failure or timeout is logged and the driver moves on to the next
//! effect. Nothing here retries; the next poll re-observes anyone still
//! present and screens them again.

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use rosterwatch_protocol::{Player, ServerConfig, SessionId};
use rosterwatch_session::{Announcement, Effect};

use crate::collab::Collaborators;
use crate::config::{TempBlacklistScope, SYSTEM_ADMIN};
use crate::CollabError;

pub(crate) struct EffectDriver {
    collab: Collaborators,
    temp_scope: TempBlacklistScope,
    call_timeout: Duration,
}

/// Runs a collaborator call, turning an overrun into a network error.
pub(crate) async fn bounded<T>(
    call_timeout: Duration,
    call: impl Future<Output = Result<T, CollabError>>,
) -> Result<T, CollabError> {
    tokio::time::timeout(call_timeout, call)
        .await
        .unwrap_or_else(|_| {
            Err(CollabError::Network(format!(
                "no answer within {call_timeout:?}"
            )))
        })
}

impl EffectDriver {
    pub(crate) fn new(
        collab: Collaborators,
        temp_scope: TempBlacklistScope,
        call_timeout: Duration,
    ) -> Self {
        Self {
            collab,
            temp_scope,
            call_timeout,
        }
    }

    async fn call<T>(
        &self,
        call: impl Future<Output = Result<T, CollabError>>,
    ) -> Result<T, CollabError> {
        bounded(self.call_timeout, call).await
    }

    /// Runs `effects` in order. Consecutive screens run concurrently.
    pub(crate) async fn execute(
        &self,
        session_id: SessionId,
        server: &ServerConfig,
        effects: Vec<Effect>,
    ) {
        let mut screens = Vec::new();
        for effect in effects {
            if let Effect::Screen {
                player,
                session_warm,
            } = effect
            {
                screens.push(self.screen(session_id, server, player, session_warm));
                continue;
            }
            if !screens.is_empty() {
                join_all(screens.drain(..)).await;
            }
            self.apply(session_id, server, effect).await;
        }
        join_all(screens).await;
    }

    async fn apply(&self, session_id: SessionId, server: &ServerConfig, effect: Effect) {
        let c = &self.collab;
        let (what, result) = match effect {
            Effect::Autosay { roster, is_warm } => (
                "autosay",
                self.call(c.autosay.on_roster(session_id, server, &roster, is_warm))
                    .await,
            ),
            Effect::RecordWarmed { players } => (
                "record warmed",
                self.call(c.warm_ledger.record(&server.name, &players))
                    .await,
            ),
            Effect::ClearTemporaryBan { player } => {
                self.clear_temporary(&player).await;
                return;
            }
            Effect::Screen {
                player,
                session_warm,
            } => {
                self.screen(session_id, server, player, session_warm).await;
                return;
            }
            Effect::LifeStatsCheck { players } => (
                "life stats check",
                self.call(c.enforcement.life_stats(session_id, server, &players))
                    .await,
            ),
            Effect::AnomalyCheck { players } => (
                "anomaly check",
                self.call(c.enforcement.weapon_anomaly(session_id, server, &players))
                    .await,
            ),
            Effect::MarkInGame { player } => (
                "mark in game",
                self.call(c.presence.mark_in_game(&player, &server.name))
                    .await,
            ),
            Effect::EvictLifeStats { persona_id } => {
                if tokio::time::timeout(self.call_timeout, c.life_stats.evict(persona_id))
                    .await
                    .is_err()
                {
                    tracing::warn!(%session_id, %persona_id, "life stats eviction timed out");
                }
                return;
            }
            Effect::ClearInGame { player } => (
                "clear in game",
                self.call(c.presence.clear_in_game(&player)).await,
            ),
            Effect::Settle { player } => (
                "settlement",
                self.call(c.settlement.enqueue(session_id, server, &player))
                    .await,
            ),
            Effect::Announce(announcement) => {
                self.announce(server, &announcement).await;
                return;
            }
        };

        if let Err(error) = result {
            tracing::warn!(%session_id, %error, effect = what, "collaborator call failed, skipped");
        }
    }

    /// Blacklist screening for one joining player.
    ///
    /// A failed lookup skips that check; it never counts as "not listed".
    async fn screen(
        &self,
        session_id: SessionId,
        server: &ServerConfig,
        player: Player,
        session_warm: bool,
    ) {
        let blacklist = &self.collab.blacklist;

        if self.temp_scope.applies(session_warm) {
            match self.call(blacklist.temporary(player.persona_id)).await {
                Ok(Some(record)) => {
                    let reason = record.temporary_reason();
                    self.kick(session_id, server, &player, &reason, SYSTEM_ADMIN)
                        .await;
                }
                Ok(None) => {}
                Err(error) => tracing::warn!(
                    %session_id,
                    persona_id = %player.persona_id,
                    %error,
                    "temporary blacklist lookup failed, skipped"
                ),
            }
        }

        match self.call(blacklist.permanent(player.persona_id)).await {
            Ok(Some(record)) => {
                let reason = record.ban_reason(server);
                self.ban(session_id, server, &player, &reason, &record.admin)
                    .await;
            }
            Ok(None) => {}
            Err(error) => tracing::warn!(
                %session_id,
                persona_id = %player.persona_id,
                %error,
                "permanent blacklist lookup failed, skipped"
            ),
        }
    }

    async fn kick(
        &self,
        session_id: SessionId,
        server: &ServerConfig,
        player: &Player,
        reason: &str,
        admin: &str,
    ) {
        match self
            .call(self.collab.admin.kick(session_id, player, reason, admin))
            .await
        {
            Ok(()) => {
                tracing::info!(
                    %session_id,
                    persona_id = %player.persona_id,
                    reason,
                    admin,
                    "player kicked"
                );
                let announcement = Announcement::Kicked {
                    server: server.name.clone(),
                    player: player.name.clone(),
                    reason: reason.to_string(),
                };
                self.announce(server, &announcement).await;
            }
            Err(error) => tracing::warn!(
                %session_id,
                persona_id = %player.persona_id,
                %error,
                "kick failed"
            ),
        }
    }

    async fn ban(
        &self,
        session_id: SessionId,
        server: &ServerConfig,
        player: &Player,
        reason: &str,
        admin: &str,
    ) {
        match self
            .call(self.collab.admin.ban(session_id, player, reason, admin))
            .await
        {
            Ok(()) => {
                tracing::info!(
                    %session_id,
                    persona_id = %player.persona_id,
                    reason,
                    admin,
                    "player banned"
                );
                let announcement = Announcement::Banned {
                    server: server.name.clone(),
                    player: player.name.clone(),
                    reason: reason.to_string(),
                };
                self.announce(server, &announcement).await;
            }
            Err(error) => tracing::warn!(
                %session_id,
                persona_id = %player.persona_id,
                %error,
                "ban failed"
            ),
        }
    }

    async fn clear_temporary(&self, player: &Player) {
        let blacklist = &self.collab.blacklist;
        match self.call(blacklist.temporary(player.persona_id)).await {
            Ok(Some(_)) => match self.call(blacklist.clear_temporary(player.persona_id)).await {
                Ok(()) => tracing::info!(
                    persona_id = %player.persona_id,
                    "temporary blacklist cleared for warmed player"
                ),
                Err(error) => tracing::warn!(
                    persona_id = %player.persona_id,
                    %error,
                    "clearing temporary blacklist failed"
                ),
            },
            Ok(None) => {}
            Err(error) => tracing::warn!(
                persona_id = %player.persona_id,
                %error,
                "temporary blacklist lookup failed, skipped"
            ),
        }
    }

    async fn announce(&self, server: &ServerConfig, announcement: &Announcement) {
        let text = announcement.to_string();
        let notify = self
            .collab
            .messenger
            .notify(server.group_id, &text, None, None);
        if let Err(error) = self.call(notify).await {
            tracing::warn!(server = %server.name, %error, "announcement not delivered");
        }
    }
}
