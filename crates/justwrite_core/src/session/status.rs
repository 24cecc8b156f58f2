//! User-visible session state published to the UI mirror.

use crate::model::draft::{Draft, NotebookId};

/// Controller lifecycle. `Ready` is the only steady state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Ready,
    /// Flushing pending writes before the controller stops.
    Terminating,
    Terminated,
}

/// Last user-visible status message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    /// Startup restored a persisted draft.
    Loaded,
    /// Startup could not read the persisted draft; editing continues.
    LoadFailed(String),
    /// Autosave confirmed.
    Saved,
    /// Autosave failed; the next edit retries.
    SaveFailed(String),
    Committed { notebook_id: NotebookId },
    /// Commit declined without side effects.
    CommitRejected(String),
    /// Commit failed in storage; draft kept.
    CommitFailed(String),
    ListFailed(String),
    OpenFailed(String),
}

impl SessionStatus {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::LoadFailed(_)
                | Self::SaveFailed(_)
                | Self::CommitRejected(_)
                | Self::CommitFailed(_)
                | Self::ListFailed(_)
                | Self::OpenFailed(_)
        )
    }

    /// Short message for the status indicator.
    pub fn message(&self) -> String {
        match self {
            Self::Idle => String::new(),
            Self::Loaded => "Draft restored".to_string(),
            Self::LoadFailed(err) => format!("Could not restore draft: {err}"),
            Self::Saved => "Draft saved".to_string(),
            Self::SaveFailed(err) => format!("Autosave failed: {err}"),
            Self::Committed { .. } => "Saved!".to_string(),
            Self::CommitRejected(reason) => format!("Failed to save: {reason}"),
            Self::CommitFailed(_) => "Failed to save".to_string(),
            Self::ListFailed(err) => format!("Could not list notebooks: {err}"),
            Self::OpenFailed(err) => format!("Could not open folder: {err}"),
        }
    }
}

/// Result of one commit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The post is durable. `cleared` is false when the draft was edited
    /// while the commit ran and the newer text was kept.
    Committed { notebook_id: NotebookId, cleared: bool },
    /// Soft failure; nothing was written.
    Rejected(String),
    /// Hard failure; nothing was written.
    Failed(String),
    /// Another commit is still running.
    Busy,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Snapshot of controller state for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub draft: Draft,
    pub notebooks: Vec<NotebookId>,
    pub status: SessionStatus,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            draft: Draft::default(),
            notebooks: Vec::new(),
            status: SessionStatus::Idle,
        }
    }
}
