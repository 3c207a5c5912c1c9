//! Live-session registry for rosterwatch.
//!
//! Each session runs as an isolated Tokio task (actor model) that owns a
//! [`ServerSession`](rosterwatch_session::ServerSession), applies polls in
//! order, and executes the resulting effects against the collaborators.
//!
//! # Key types
//!
//! - [`Registry`]: creates/closes sessions, routes polls, answers queries
//! - [`SessionHandle`]: send commands to a running session actor
//! - [`Collaborators`]: the external services, as trait objects
//! - [`ReputationService`]: retried reputation lookups for commands
//! - [`RegistryConfig`]: channel size and congestion/blacklist scoping

mod actor;
mod collab;
mod config;
mod driver;
mod error;
mod memory;
mod registry;
mod reputation;

pub use actor::{Clock, SessionHandle};
pub use collab::{
    Autosay, BanKind, BlacklistRecord, BlacklistStore, BotRoster, Collaborators,
    CommunityDirectory, EnforcementChecks, GameAdmin, LifeStatsCache, Messenger, Presence,
    ReputationLookup, ReputationProfile, SettlementQueue, StatusCheck, Unwired, WarmPlayerLedger,
};
pub use config::{CongestionScope, RegistryConfig, TempBlacklistScope, SYSTEM_ADMIN};
pub use error::{CollabError, RegistryError};
pub use memory::{MemoryBlacklist, MemoryLifeStats, MemoryWarmLedger};
pub use registry::{PlayerLookup, Registry};
pub use reputation::{ReputationReply, ReputationReport, ReputationService, NETWORK_ISSUE};
