//! Session controller: owner of the in-memory draft.
//!
//! # Responsibility
//! - Restore the persisted draft once, before any autosave write.
//! - Apply edit and selection events synchronously, then schedule autosave.
//! - Orchestrate commits and the post-commit clear of persisted state.
//!
//! # Invariants
//! - Handlers never await I/O; every store, commit and directory call runs in
//!   its own task and reports back as a `Completion`.
//! - Collaborators only receive snapshots of the draft.
//! - A failed commit never modifies the draft, in memory or persisted.
//! - Every failure ends as a `SessionStatus`; nothing escapes the loop.

use super::autosave::{AutosaveAction, AutosaveScheduler, WriteKind};
use super::status::{CommitOutcome, SessionPhase, SessionStatus, SessionView};
use crate::logging::redacted;
use crate::model::draft::{Draft, NotebookId};
use crate::notebook::{NotebookDirectory, NotebookError, NotebookResult};
use crate::repo::draft_repo::{DraftStore, StoreError, StoreResult};
use crate::service::commit_service::{check_commit, CommitError, CommitResult, CommitService};
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};

const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(300);

/// Session tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period before the first autosave of an edit burst. Zero writes
    /// on the first edit.
    pub autosave_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
        }
    }
}

impl SessionConfig {
    /// Autosave without a quiet period.
    pub fn immediate() -> Self {
        Self {
            autosave_delay: Duration::ZERO,
        }
    }
}

/// UI event delivered to the controller.
pub(crate) enum SessionCommand {
    Edit(String),
    SelectNotebook(NotebookId),
    Commit(oneshot::Sender<CommitOutcome>),
    RefreshNotebooks(oneshot::Sender<Vec<NotebookId>>),
    /// Opens the given notebook, or the selected one when `None`.
    OpenLocation(Option<NotebookId>),
    Snapshot(oneshot::Sender<Draft>),
    Flush(oneshot::Sender<()>),
    Terminate(oneshot::Sender<()>),
}

/// I/O completion delivered back to the controller.
pub(crate) enum Completion {
    TimerElapsed {
        generation: u64,
    },
    WriteFinished {
        kind: WriteKind,
        result: StoreResult<()>,
    },
    CommitFinished {
        snapshot: Draft,
        revision: u64,
        result: CommitResult<bool>,
    },
    NotebooksListed {
        result: NotebookResult<Vec<NotebookId>>,
    },
    LocationOpened {
        notebook_id: NotebookId,
        result: NotebookResult<()>,
    },
}

pub(crate) struct SessionController<S, C, D> {
    store: Arc<S>,
    commits: Arc<C>,
    directory: Arc<D>,
    config: SessionConfig,
    phase: SessionPhase,
    draft: Draft,
    /// Bumped on every in-memory draft change.
    revision: u64,
    notebooks: Vec<NotebookId>,
    status: SessionStatus,
    autosave: AutosaveScheduler,
    commit_in_flight: bool,
    commit_reply: Option<oneshot::Sender<CommitOutcome>>,
    listing: bool,
    list_waiters: Vec<oneshot::Sender<Vec<NotebookId>>>,
    idle_waiters: Vec<oneshot::Sender<()>>,
    completions: mpsc::UnboundedSender<Completion>,
    view: watch::Sender<SessionView>,
}

impl<S, C, D> SessionController<S, C, D>
where
    S: DraftStore + 'static,
    C: CommitService + 'static,
    D: NotebookDirectory + 'static,
{
    pub(crate) fn new(
        store: Arc<S>,
        commits: Arc<C>,
        directory: Arc<D>,
        config: SessionConfig,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> (Self, watch::Receiver<SessionView>) {
        let (view, view_rx) = watch::channel(SessionView::default());
        let debounce = !config.autosave_delay.is_zero();
        let controller = Self {
            store,
            commits,
            directory,
            config,
            phase: SessionPhase::Uninitialized,
            draft: Draft::default(),
            revision: 0,
            notebooks: Vec::new(),
            status: SessionStatus::Idle,
            autosave: AutosaveScheduler::new(debounce),
            commit_in_flight: false,
            commit_reply: None,
            listing: false,
            list_waiters: Vec::new(),
            idle_waiters: Vec::new(),
            completions,
            view,
        };
        (controller, view_rx)
    }

    /// `Uninitialized -> Ready`: restores the draft and the notebook list.
    ///
    /// This is the only read of persisted draft state. It completes before
    /// the event loop starts, so no autosave can overtake it.
    pub(crate) async fn start(&mut self) {
        if self.phase != SessionPhase::Uninitialized {
            return;
        }
        let started_at = Instant::now();
        info!("event=session_start module=session status=start");

        match self.store.load().await {
            Ok(draft) => {
                info!(
                    "event=draft_load module=session status=ok text={} notebook={}",
                    redacted(&draft.text),
                    draft.notebook_id
                );
                self.status = if draft.is_empty() {
                    SessionStatus::Idle
                } else {
                    SessionStatus::Loaded
                };
                self.draft = draft;
            }
            Err(err) => {
                error!("event=draft_load module=session status=error error={err}");
                self.status = SessionStatus::LoadFailed(err.to_string());
            }
        }

        match self.directory.list().await {
            Ok(ids) => self.notebooks = ids,
            Err(err) => {
                warn!("event=notebook_list module=session status=error error={err}");
                if !self.status.is_error() {
                    self.status = SessionStatus::ListFailed(err.to_string());
                }
            }
        }

        self.phase = SessionPhase::Ready;
        self.publish();
        info!(
            "event=session_start module=session status=ok duration_ms={} notebooks={}",
            started_at.elapsed().as_millis(),
            self.notebooks.len()
        );
    }

    /// Event loop. Runs until terminated or until every handle is dropped and
    /// pending writes are flushed.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        let mut accepting = true;
        loop {
            tokio::select! {
                command = commands.recv(), if accepting => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        accepting = false;
                        self.begin_termination(None);
                    }
                },
                Some(completion) = completions.recv() => self.handle_completion(completion),
                else => break,
            }

            if self.phase == SessionPhase::Terminating && self.is_idle() {
                self.finish_termination();
                break;
            }
            self.settle();
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Edit(text) => self.on_edit(text),
            SessionCommand::SelectNotebook(id) => self.on_select(id),
            SessionCommand::Commit(reply) => self.on_commit(reply),
            SessionCommand::RefreshNotebooks(reply) => self.on_refresh(reply),
            SessionCommand::OpenLocation(id) => self.on_open_location(id),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.draft.clone());
            }
            SessionCommand::Flush(reply) => {
                self.idle_waiters.push(reply);
                let action = self.autosave.flush();
                self.apply(action);
            }
            SessionCommand::Terminate(reply) => self.begin_termination(Some(reply)),
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::TimerElapsed { generation } => {
                let action = self.autosave.timer_elapsed(generation);
                self.apply(action);
            }
            Completion::WriteFinished { kind, result } => self.on_write_finished(kind, result),
            Completion::CommitFinished {
                snapshot,
                revision,
                result,
            } => self.on_commit_finished(snapshot, revision, result),
            Completion::NotebooksListed { result } => self.on_notebooks_listed(result),
            Completion::LocationOpened {
                notebook_id,
                result,
            } => {
                if let Err(err) = result {
                    warn!(
                        "event=open_location module=session status=error notebook={notebook_id} error={err}"
                    );
                    self.status = SessionStatus::OpenFailed(err.to_string());
                    self.publish();
                }
            }
        }
    }

    fn accepts_input(&self, event: &str) -> bool {
        if self.phase == SessionPhase::Ready {
            return true;
        }
        warn!(
            "event={event} module=session status=ignored phase={:?}",
            self.phase
        );
        false
    }

    fn on_edit(&mut self, text: String) {
        if !self.accepts_input("edit") || self.draft.text == text {
            return;
        }
        self.draft.text = text;
        self.draft_changed();
    }

    fn on_select(&mut self, notebook_id: NotebookId) {
        if !self.accepts_input("select_notebook") || self.draft.notebook_id == notebook_id {
            return;
        }
        debug!("event=select_notebook module=session status=ok notebook={notebook_id}");
        self.draft.notebook_id = notebook_id;
        self.draft_changed();
    }

    fn draft_changed(&mut self) {
        self.revision += 1;
        self.publish();
        let action = self.autosave.mark_dirty();
        self.apply(action);
    }

    fn on_commit(&mut self, reply: oneshot::Sender<CommitOutcome>) {
        if !self.accepts_input("commit") {
            let _ = reply.send(CommitOutcome::Failed("session is not ready".to_string()));
            return;
        }
        if self.commit_in_flight {
            warn!("event=commit module=session status=busy");
            let _ = reply.send(CommitOutcome::Busy);
            return;
        }

        let snapshot = self.draft.clone();
        let revision = self.revision;
        info!(
            "event=commit module=session status=start notebook={} text={}",
            snapshot.notebook_id,
            redacted(&snapshot.text)
        );
        self.commit_in_flight = true;
        self.commit_reply = Some(reply);

        let commits = Arc::clone(&self.commits);
        let task_snapshot = snapshot.clone();
        self.spawn_io(
            async move {
                let result = commits
                    .commit(
                        task_snapshot.notebook_id.clone(),
                        task_snapshot.text.clone(),
                    )
                    .await;
                Completion::CommitFinished {
                    snapshot: task_snapshot,
                    revision,
                    result,
                }
            },
            move |message| Completion::CommitFinished {
                snapshot,
                revision,
                result: Err(CommitError::Task(message)),
            },
        );
    }

    fn on_commit_finished(&mut self, snapshot: Draft, revision: u64, result: CommitResult<bool>) {
        self.commit_in_flight = false;
        let outcome = match result {
            Ok(true) => {
                let cleared = self.revision == revision;
                if cleared {
                    self.draft = snapshot.cleared();
                    self.revision += 1;
                    let action = self.autosave.request_clear();
                    self.apply(action);
                } else {
                    warn!(
                        "event=commit_clear module=session status=skipped reason=edited_during_commit notebook={}",
                        snapshot.notebook_id
                    );
                }
                info!(
                    "event=commit module=session status=ok notebook={} cleared={cleared}",
                    snapshot.notebook_id
                );
                self.status = SessionStatus::Committed {
                    notebook_id: snapshot.notebook_id.clone(),
                };
                CommitOutcome::Committed {
                    notebook_id: snapshot.notebook_id,
                    cleared,
                }
            }
            Ok(false) => {
                let reason = check_commit(&snapshot.notebook_id, &snapshot.text)
                    .err()
                    .map_or("commit declined", |rejection| rejection.as_str())
                    .to_string();
                warn!(
                    "event=commit module=session status=rejected notebook={} reason={reason}",
                    snapshot.notebook_id
                );
                self.status = SessionStatus::CommitRejected(reason.clone());
                CommitOutcome::Rejected(reason)
            }
            Err(err) => {
                error!(
                    "event=commit module=session status=error notebook={} error={err}",
                    snapshot.notebook_id
                );
                self.status = SessionStatus::CommitFailed(err.to_string());
                CommitOutcome::Failed(err.to_string())
            }
        };

        if let Some(reply) = self.commit_reply.take() {
            let _ = reply.send(outcome);
        }
        self.publish();
    }

    fn on_write_finished(&mut self, kind: WriteKind, result: StoreResult<()>) {
        let action = match result {
            Ok(()) => {
                debug!("event=autosave module=session status=ok kind={kind:?}");
                if kind == WriteKind::Save
                    && matches!(
                        self.status,
                        SessionStatus::Idle | SessionStatus::Loaded | SessionStatus::SaveFailed(_)
                    )
                {
                    self.status = SessionStatus::Saved;
                }
                self.autosave.write_finished()
            }
            Err(err) => {
                warn!("event=autosave module=session status=error kind={kind:?} error={err}");
                self.status = SessionStatus::SaveFailed(err.to_string());
                self.autosave.write_failed()
            }
        };
        self.apply(action);
        self.publish();
    }

    fn on_refresh(&mut self, reply: oneshot::Sender<Vec<NotebookId>>) {
        self.list_waiters.push(reply);
        if self.listing {
            return;
        }
        self.listing = true;
        let directory = Arc::clone(&self.directory);
        self.spawn_io(
            async move {
                Completion::NotebooksListed {
                    result: directory.list().await,
                }
            },
            |message| Completion::NotebooksListed {
                result: Err(NotebookError::Io(std::io::Error::other(message))),
            },
        );
    }

    fn on_notebooks_listed(&mut self, result: NotebookResult<Vec<NotebookId>>) {
        self.listing = false;
        match result {
            Ok(ids) => {
                debug!(
                    "event=notebook_list module=session status=ok count={}",
                    ids.len()
                );
                self.notebooks = ids;
            }
            Err(err) => {
                warn!("event=notebook_list module=session status=error error={err}");
                self.status = SessionStatus::ListFailed(err.to_string());
            }
        }
        for waiter in self.list_waiters.drain(..) {
            let _ = waiter.send(self.notebooks.clone());
        }
        self.publish();
    }

    fn on_open_location(&mut self, notebook_id: Option<NotebookId>) {
        if !self.accepts_input("open_location") {
            return;
        }
        let notebook_id = notebook_id.unwrap_or_else(|| self.draft.notebook_id.clone());
        if notebook_id.trim().is_empty() {
            self.status = SessionStatus::OpenFailed("no notebook selected".to_string());
            self.publish();
            return;
        }

        let directory = Arc::clone(&self.directory);
        let aborted_id = notebook_id.clone();
        self.spawn_io(
            async move {
                let result = directory.open_location(notebook_id.clone()).await;
                Completion::LocationOpened {
                    notebook_id,
                    result,
                }
            },
            move |message| Completion::LocationOpened {
                notebook_id: aborted_id,
                result: Err(NotebookError::Io(std::io::Error::other(message))),
            },
        );
    }

    fn begin_termination(&mut self, reply: Option<oneshot::Sender<()>>) {
        if let Some(reply) = reply {
            self.idle_waiters.push(reply);
        }
        if self.phase == SessionPhase::Ready {
            info!("event=session_stop module=session status=start");
            self.phase = SessionPhase::Terminating;
            self.publish();
        }
        let action = self.autosave.flush();
        self.apply(action);
    }

    fn finish_termination(&mut self) {
        self.phase = SessionPhase::Terminated;
        self.publish();
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
        for waiter in self.list_waiters.drain(..) {
            let _ = waiter.send(self.notebooks.clone());
        }
        info!("event=session_stop module=session status=ok");
    }

    fn is_idle(&self) -> bool {
        self.autosave.is_idle() && !self.commit_in_flight
    }

    /// Releases flush waiters once nothing is pending.
    fn settle(&mut self) {
        if self.phase == SessionPhase::Ready && self.is_idle() {
            for waiter in self.idle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn apply(&mut self, action: AutosaveAction) {
        match action {
            AutosaveAction::Nothing => {}
            AutosaveAction::ArmTimer { generation } => {
                let delay = self.config.autosave_delay;
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = completions.send(Completion::TimerElapsed { generation });
                });
            }
            AutosaveAction::Write(kind) => self.issue_write(kind),
        }
    }

    /// Starts a store write of the draft as it is right now.
    fn issue_write(&mut self, kind: WriteKind) {
        let store = Arc::clone(&self.store);
        let draft = self.draft.clone();
        debug!(
            "event=autosave module=session status=start kind={kind:?} text={} notebook={}",
            redacted(&draft.text),
            draft.notebook_id
        );
        self.spawn_io(
            async move {
                let result = match kind {
                    WriteKind::Save => store.save(draft).await,
                    WriteKind::Clear => match store.clear().await {
                        Ok(()) if !draft.is_empty() => store.save(draft).await,
                        other => other,
                    },
                };
                Completion::WriteFinished { kind, result }
            },
            move |message| Completion::WriteFinished {
                kind,
                result: Err(StoreError::Task(message)),
            },
        );
    }

    /// Runs `task` detached; a panic or cancellation becomes `on_abort`.
    fn spawn_io<F, A>(&self, task: F, on_abort: A)
    where
        F: Future<Output = Completion> + Send + 'static,
        A: FnOnce(String) -> Completion + Send + 'static,
    {
        let completions = self.completions.clone();
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            let completion = match handle.await {
                Ok(completion) => completion,
                Err(err) => on_abort(err.to_string()),
            };
            let _ = completions.send(completion);
        });
    }

    fn publish(&self) {
        self.view.send_replace(SessionView {
            phase: self.phase,
            draft: self.draft.clone(),
            notebooks: self.notebooks.clone(),
            status: self.status.clone(),
        });
    }
}
