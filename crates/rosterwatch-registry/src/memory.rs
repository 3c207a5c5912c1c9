//! In-memory collaborator implementations.
//!
//! Good enough for a single process and for tests. State lives behind a
//! Tokio `RwLock` and disappears with the process.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rosterwatch_protocol::{LifeStats, PersonaId, Player};
use tokio::sync::RwLock;

use crate::collab::{BanKind, BlacklistRecord, BlacklistStore, LifeStatsCache, WarmPlayerLedger};
use crate::CollabError;

/// Both blacklists in one map. Last write wins.
#[derive(Debug, Default)]
pub struct MemoryBlacklist {
    records: RwLock<HashMap<(BanKind, PersonaId), BlacklistRecord>>,
}

impl MemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get(&self, kind: BanKind, persona_id: PersonaId) -> Option<BlacklistRecord> {
        self.records.read().await.get(&(kind, persona_id)).cloned()
    }
}

#[async_trait]
impl BlacklistStore for MemoryBlacklist {
    async fn permanent(
        &self,
        persona_id: PersonaId,
    ) -> Result<Option<BlacklistRecord>, CollabError> {
        Ok(self.get(BanKind::Permanent, persona_id).await)
    }

    async fn temporary(
        &self,
        persona_id: PersonaId,
    ) -> Result<Option<BlacklistRecord>, CollabError> {
        Ok(self.get(BanKind::Temporary, persona_id).await)
    }

    async fn clear_temporary(&self, persona_id: PersonaId) -> Result<(), CollabError> {
        self.records
            .write()
            .await
            .remove(&(BanKind::Temporary, persona_id));
        Ok(())
    }

    async fn add(&self, record: BlacklistRecord) -> Result<(), CollabError> {
        let key = (record.kind, record.persona_id);
        if let Some(old) = self.records.write().await.insert(key, record) {
            tracing::debug!(persona_id = %old.persona_id, "blacklist record replaced");
        }
        Ok(())
    }

    async fn remove(&self, kind: BanKind, persona_id: PersonaId) -> Result<bool, CollabError> {
        Ok(self
            .records
            .write()
            .await
            .remove(&(kind, persona_id))
            .is_some())
    }

    async fn list(&self, kind: BanKind) -> Result<Vec<BlacklistRecord>, CollabError> {
        let mut records: Vec<BlacklistRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.added_at);
        Ok(records)
    }
}

#[derive(Debug, Default)]
pub struct MemoryLifeStats {
    entries: RwLock<HashMap<PersonaId, LifeStats>>,
}

impl MemoryLifeStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LifeStatsCache for MemoryLifeStats {
    async fn get(&self, persona_id: PersonaId) -> Option<LifeStats> {
        self.entries.read().await.get(&persona_id).cloned()
    }

    async fn insert(&self, stats: LifeStats) {
        self.entries.write().await.insert(stats.persona_id, stats);
    }

    async fn evict(&self, persona_id: PersonaId) {
        self.entries.write().await.remove(&persona_id);
    }
}

/// Warmed player names, with the server that last warmed each.
#[derive(Debug, Default)]
pub struct MemoryWarmLedger {
    names: RwLock<HashMap<String, String>>,
}

impl MemoryWarmLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The server that last warmed `name`.
    pub async fn warmed_on(&self, name: &str) -> Option<String> {
        self.names.read().await.get(name).cloned()
    }
}

#[async_trait]
impl WarmPlayerLedger for MemoryWarmLedger {
    async fn record(&self, server: &str, players: &[Player]) -> Result<(), CollabError> {
        let mut names = self.names.write().await;
        for player in players {
            names.insert(player.name.clone(), server.to_string());
        }
        Ok(())
    }

    async fn warmed_names(&self) -> Result<HashSet<String>, CollabError> {
        Ok(self.names.read().await.keys().cloned().collect())
    }
}
