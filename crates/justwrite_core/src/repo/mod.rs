//! Repository layer for session state persistence.
//!
//! # Responsibility
//! - Define the draft store contract consumed by the session controller.
//! - Isolate SQLite details from session orchestration.

pub mod draft_repo;
