//! Core domain logic for JustWrite.
//! This crate is the single source of truth for draft, notebook and commit
//! invariants; UI layers only talk to it through `SessionHandle`.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notebook;
pub mod repo;
pub mod search;
pub mod service;
pub mod session;

pub use config::{AppConfig, BaseDirs, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, redacted, LogError};
pub use model::draft::{Draft, NotebookId};
pub use notebook::{
    list_notebooks, FsNotebookDirectory, Notebook, NotebookDirectory, NotebookError, PostRecord,
};
pub use repo::draft_repo::{DraftStore, SqliteDraftStore, StoreError, StoreResult};
pub use service::commit_service::{CommitError, CommitResult, CommitService, NotebookCommitService};
pub use session::{
    start_session, CommitOutcome, SessionConfig, SessionError, SessionHandle, SessionPhase,
    SessionStatus, SessionView,
};
