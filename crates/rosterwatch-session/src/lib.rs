//! Per-server roster reconciliation for rosterwatch.
//!
//! This crate turns a stream of roster polls for one game instance into
//! join/leave events, a warm/cold population state, and a list of side
//! effects for someone else to perform:
//!
//! 1. **Reconciliation**: [`ServerSession::update`] diffs each poll
//!    against the last accepted roster by persona id
//! 2. **Warm-up**: [`WarmState`] flips on population crossings and grants
//!    warm status to the longest-present players
//! 3. **Congestion**: [`CongestionDetector`] flags probable stuck queues
//!
//! Nothing here does I/O. Updates return [`Effect`]s, and the registry
//! layer executes them against the real collaborators.
//!
//! ```text
//! Registry Layer (above)  ← owns sessions, executes effects
//!     ↕
//! Session Layer (this crate)  ← pure state machines
//!     ↕
//! Protocol Layer (below)  ← Player, ServerRoster, ServerConfig
//! ```

mod congestion;
mod effect;
mod error;
mod session;
mod warmup;

pub use congestion::{CongestionAlert, CongestionConfig, CongestionDetector};
pub use effect::{Announcement, Effect};
pub use error::SessionError;
pub use session::{ServerSession, SessionInfo, UpdateContext, UpdateOutcome};
pub use warmup::{Transition, WarmState};
