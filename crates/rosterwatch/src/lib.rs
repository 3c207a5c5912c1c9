//! # Rosterwatch
//!
//! Live roster tracking for a fleet of game servers.
//!
//! Each poll of a server's roster is diffed against the last one. Joins
//! and leaves drive blacklist enforcement, stat checks, warm-up tracking
//! and congestion alerts. All outward work goes through collaborator
//! traits, so storage and chat backends are pluggable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rosterwatch::prelude::*;
//!
//! # async fn start(polls: tokio::sync::mpsc::Receiver<PollEvent>) -> Result<(), WatchError> {
//! rosterwatch::logging::init("info");
//!
//! let config = WatchConfig::from_json_str(r#"{ "servers": [{ "name": "alpha" }] }"#)?;
//! let watcher = Watcher::new(config, Collaborators::default())?;
//! watcher.run(polls).await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod logging;
mod watcher;

pub use config::WatchConfig;
pub use error::WatchError;
pub use watcher::{PlayerQuery, PollEvent, RosterPoll, Watcher};

pub use rosterwatch_fuzzy as fuzzy;
pub use rosterwatch_protocol as protocol;
pub use rosterwatch_registry as registry;
pub use rosterwatch_retry as retry;
pub use rosterwatch_session as session;

/// The types most deployments need.
pub mod prelude {
    pub use crate::{PlayerQuery, PollEvent, RosterPoll, WatchConfig, WatchError, Watcher};
    pub use rosterwatch_protocol::{
        Player, RosterEntry, RosterSnapshot, ServerConfig, ServerRoster, SessionId, Team,
    };
    pub use rosterwatch_registry::{Collaborators, ReputationReply};
}
