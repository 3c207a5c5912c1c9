//! Shared data model for rosterwatch.
//!
//! This crate defines the values that flow between the poller, the
//! per-server reconcilers, and the command layer:
//!
//! - **Identity** ([`PersonaId`], [`SessionId`]): stable player identity
//!   and volatile game-instance identity.
//! - **Rosters** ([`RosterEntry`], [`RosterSnapshot`], [`Player`],
//!   [`ServerRoster`]): what the poller reports and what a session keeps.
//! - **Configuration** ([`ServerConfig`], [`ServerVariant`]): per-server
//!   settings that drive warm-up and enforcement.
//! - **Event log** ([`LogEntry`], [`LogAction`]): join/leave history.
//! - **Life statistics** ([`LifeStats`] and its upstream payloads).
//!
//! ```text
//! Poller (RosterSnapshot) → Session (ServerRoster, LogEntry) → Registry
//! ```

mod error;
mod stats;
mod types;

pub use error::ProtocolError;
#[cfg(feature = "json")]
pub use stats::decode_payload;
pub use stats::{CareerPayload, LegacyPayload, LifeStats, SeasonPayload};
pub use types::{
    LogAction, LogEntry, PersonaId, Player, RosterEntry, RosterSnapshot,
    ServerConfig, ServerRoster, ServerVariant, SessionId, Team,
    SERVER_CAPACITY, TEAM_CAPACITY, WARM_ACTIVATION,
};
