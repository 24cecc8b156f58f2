//! Domain model shared by session, storage and notebook layers.
//!
//! # Responsibility
//! - Define the draft record exchanged between UI mirror, autosave and commit.
//!
//! # Invariants
//! - Collaborators only ever receive owned copies of a `Draft`.

pub mod draft;
