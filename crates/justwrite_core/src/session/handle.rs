//! Cloneable front door to a running session.

use super::controller::{SessionCommand, SessionConfig, SessionController};
use super::status::{CommitOutcome, SessionView};
use crate::model::draft::{Draft, NotebookId};
use crate::notebook::NotebookDirectory;
use crate::repo::draft_repo::DraftStore;
use crate::service::commit_service::CommitService;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// The session actor is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Closed,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "session is closed"),
        }
    }
}

impl Error for SessionError {}

pub type SessionResult<T> = Result<T, SessionError>;

/// Starts a session: restores the draft, lists notebooks, then spawns the
/// controller on the current tokio runtime.
///
/// The returned handle only exists once the controller is `Ready`, so every
/// event it sends is ordered after the startup load.
pub async fn start_session<S, C, D>(
    store: S,
    commits: C,
    directory: D,
    config: SessionConfig,
) -> SessionHandle
where
    S: DraftStore + 'static,
    C: CommitService + 'static,
    D: NotebookDirectory + 'static,
{
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    let (mut controller, view) = SessionController::new(
        Arc::new(store),
        Arc::new(commits),
        Arc::new(directory),
        config,
        completions_tx,
    );
    controller.start().await;

    let (commands, commands_rx) = mpsc::unbounded_channel();
    tokio::spawn(controller.run(commands_rx, completions_rx));
    SessionHandle { commands, view }
}

/// Sends UI events to the session. Dropping every clone flushes pending
/// autosave writes and stops the controller.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Replaces the draft text. Returns immediately; autosave follows.
    pub fn edit(&self, text: impl Into<String>) -> SessionResult<()> {
        self.send(SessionCommand::Edit(text.into()))
    }

    /// Changes the selected notebook. Returns immediately; autosave follows.
    pub fn select_notebook(&self, notebook_id: impl Into<NotebookId>) -> SessionResult<()> {
        self.send(SessionCommand::SelectNotebook(notebook_id.into()))
    }

    /// Opens the selected notebook's folder. Failures surface as status.
    pub fn open_location(&self) -> SessionResult<()> {
        self.send(SessionCommand::OpenLocation(None))
    }

    pub fn open_notebook_location(&self, notebook_id: impl Into<NotebookId>) -> SessionResult<()> {
        self.send(SessionCommand::OpenLocation(Some(notebook_id.into())))
    }

    /// Commits the current draft into its selected notebook.
    pub async fn commit(&self) -> SessionResult<CommitOutcome> {
        self.request(SessionCommand::Commit).await
    }

    /// Re-lists notebooks and returns the selector contents.
    pub async fn refresh_notebooks(&self) -> SessionResult<Vec<NotebookId>> {
        self.request(SessionCommand::RefreshNotebooks).await
    }

    /// Current in-memory draft, after all previously sent events.
    pub async fn draft(&self) -> SessionResult<Draft> {
        self.request(SessionCommand::Snapshot).await
    }

    /// Waits until no autosave is pending or running and no commit runs.
    pub async fn flush(&self) -> SessionResult<()> {
        self.request(SessionCommand::Flush).await
    }

    /// Flushes pending writes and stops the controller. Idempotent.
    pub async fn terminate(&self) -> SessionResult<()> {
        match self.request(SessionCommand::Terminate).await {
            Ok(()) | Err(SessionError::Closed) => Ok(()),
        }
    }

    /// Latest published state.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every published state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: SessionCommand) -> SessionResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Closed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> SessionResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply))?;
        response.await.map_err(|_| SessionError::Closed)
    }
}
