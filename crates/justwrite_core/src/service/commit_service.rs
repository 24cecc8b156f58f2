//! Commit use-case service.
//!
//! # Responsibility
//! - Durably record draft text as a new post in a notebook.
//! - Separate recognized soft failures from hard storage errors.
//!
//! # Invariants
//! - `Ok(true)` iff a post file and its index line were written.
//! - `Ok(false)` and `Err(_)` leave the notebook unchanged.

use crate::model::draft::NotebookId;
use crate::notebook::{validate_id, Notebook, NotebookError, PostRecord};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::PathBuf;

pub type CommitResult<T> = Result<T, CommitError>;

/// Hard commit failure.
#[derive(Debug)]
pub enum CommitError {
    Notebook(NotebookError),
    /// The blocking commit worker panicked or was cancelled.
    Task(String),
}

impl Display for CommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notebook(err) => write!(f, "{err}"),
            Self::Task(message) => write!(f, "commit task failed: {message}"),
        }
    }
}

impl Error for CommitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Notebook(err) => Some(err),
            Self::Task(_) => None,
        }
    }
}

impl From<NotebookError> for CommitError {
    fn from(value: NotebookError) -> Self {
        Self::Notebook(value)
    }
}

/// Reason a commit was declined without touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitRejection {
    NoNotebookSelected,
    InvalidNotebookId,
    EmptyText,
}

impl CommitRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoNotebookSelected => "no notebook selected",
            Self::InvalidNotebookId => "invalid notebook id",
            Self::EmptyText => "nothing to save",
        }
    }
}

/// Checks the soft-failure preconditions of a commit.
pub fn check_commit(notebook_id: &str, text: &str) -> Result<(), CommitRejection> {
    if notebook_id.trim().is_empty() {
        return Err(CommitRejection::NoNotebookSelected);
    }
    if validate_id(notebook_id).is_err() {
        return Err(CommitRejection::InvalidNotebookId);
    }
    if text.trim().is_empty() {
        return Err(CommitRejection::EmptyText);
    }
    Ok(())
}

/// Commits draft text into a notebook.
pub trait CommitService: Send + Sync {
    /// Returns `Ok(true)` on durable write, `Ok(false)` on a soft failure.
    fn commit(
        &self,
        notebook_id: NotebookId,
        text: String,
    ) -> impl Future<Output = CommitResult<bool>> + Send;
}

/// Commit service writing posts into notebooks under one root.
#[derive(Debug, Clone)]
pub struct NotebookCommitService {
    root: PathBuf,
}

impl NotebookCommitService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Blocking commit returning the written post, or `None` when declined.
    pub fn commit_blocking(
        &self,
        notebook_id: &str,
        text: &str,
    ) -> CommitResult<Option<PostRecord>> {
        if let Err(rejection) = check_commit(notebook_id, text) {
            warn!(
                "event=commit module=service status=rejected notebook={} reason={}",
                notebook_id,
                rejection.as_str()
            );
            return Ok(None);
        }

        let result = Notebook::load(&self.root, notebook_id).and_then(|notebook| notebook.post(text));
        match result {
            Ok(record) => {
                info!(
                    "event=commit module=service status=ok notebook={} file={}",
                    record.notebook_id, record.file_name
                );
                Ok(Some(record))
            }
            Err(err) => {
                error!(
                    "event=commit module=service status=error notebook={} error={}",
                    notebook_id, err
                );
                Err(err.into())
            }
        }
    }
}

impl CommitService for NotebookCommitService {
    fn commit(
        &self,
        notebook_id: NotebookId,
        text: String,
    ) -> impl Future<Output = CommitResult<bool>> + Send {
        let service = self.clone();
        async move {
            tokio::task::spawn_blocking(move || service.commit_blocking(&notebook_id, &text))
                .await
                .map_err(|err| CommitError::Task(err.to_string()))?
                .map(|record| record.is_some())
        }
    }
}
