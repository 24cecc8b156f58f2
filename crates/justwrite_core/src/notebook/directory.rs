//! Notebook enumeration and folder-open side effect.

use super::{list_notebooks, Notebook, NotebookError, NotebookResult};
use crate::model::draft::NotebookId;
use log::{info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Read-only view over the notebooks known to the session.
pub trait NotebookDirectory: Send + Sync {
    /// Current notebook ids in display order. Reflects the file system at
    /// call time.
    fn list(&self) -> impl Future<Output = NotebookResult<Vec<NotebookId>>> + Send;
    /// Opens the notebook's folder in the OS file browser without waiting.
    fn open_location(&self, id: NotebookId) -> impl Future<Output = NotebookResult<()>> + Send;
}

/// Platform file manager command.
#[cfg(target_os = "macos")]
pub fn file_manager() -> &'static str {
    "open"
}

#[cfg(target_os = "windows")]
pub fn file_manager() -> &'static str {
    "explorer"
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn file_manager() -> &'static str {
    "xdg-open"
}

/// File-system notebook directory rooted at one folder.
#[derive(Debug, Clone)]
pub struct FsNotebookDirectory {
    root: PathBuf,
    launcher: String,
}

impl FsNotebookDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_launcher(root, file_manager())
    }

    /// Uses `launcher` instead of the platform file manager.
    pub fn with_launcher(root: impl Into<PathBuf>, launcher: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            launcher: launcher.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Blocking variant of `open_location`.
    pub fn open_location_blocking(&self, id: &str) -> NotebookResult<()> {
        let notebook = Notebook::load(&self.root, id)?;
        let spawned = Command::new(&self.launcher)
            .arg(&notebook.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(_child) => {
                info!(
                    "event=open_location module=notebook status=ok notebook={} launcher={}",
                    notebook.id, self.launcher
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=open_location module=notebook status=error notebook={} launcher={} error={}",
                    notebook.id, self.launcher, err
                );
                Err(err.into())
            }
        }
    }
}

impl NotebookDirectory for FsNotebookDirectory {
    fn list(&self) -> impl Future<Output = NotebookResult<Vec<NotebookId>>> + Send {
        let root = self.root.clone();
        async move {
            let listed = tokio::task::spawn_blocking(move || list_notebooks(&root))
                .await
                .map_err(join_error)??;
            Ok(listed.into_iter().map(|notebook| notebook.id).collect())
        }
    }

    fn open_location(&self, id: NotebookId) -> impl Future<Output = NotebookResult<()>> + Send {
        let directory = self.clone();
        async move {
            tokio::task::spawn_blocking(move || directory.open_location_blocking(&id))
                .await
                .map_err(join_error)?
        }
    }
}

fn join_error(err: tokio::task::JoinError) -> NotebookError {
    NotebookError::Io(std::io::Error::other(err.to_string()))
}
