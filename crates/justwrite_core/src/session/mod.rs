//! Session state synchronization.
//!
//! # Responsibility
//! - Own the single in-memory draft and mirror it to the UI.
//! - Coalesce autosave writes; restore the draft once at startup.
//! - Sequence commits and the post-commit clear against autosave.
//!
//! # Invariants
//! - Startup load happens-before the first autosave write.
//! - At most one draft store write is in flight; a trailing write follows
//!   if the draft changed meanwhile.
//! - A successful commit's clear is issued strictly after any in-flight
//!   save, so a late autosave cannot resurrect committed text.
//! - A failed commit leaves the draft untouched.

mod autosave;
mod controller;
mod handle;
mod status;

pub use autosave::WriteKind;
pub use controller::SessionConfig;
pub use handle::{start_session, SessionError, SessionHandle, SessionResult};
pub use status::{CommitOutcome, SessionPhase, SessionStatus, SessionView};
