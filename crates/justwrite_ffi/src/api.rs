//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the session (edit, select, commit, open folder, terminate) to
//!   Dart via FRB.
//! - Expose the host-shell calls (list notebooks, open a notebook folder,
//!   persist/load/commit a draft) for UIs that drive state themselves.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every failure is reported in a response envelope, never thrown.
//! - Draft text never reaches the log.

use crate::draft_writer::DraftWriter;
use justwrite_core::{
    init_logging as init_logging_inner, start_session, AppConfig, CommitOutcome, CommitService,
    Draft, DraftStore, FsNotebookDirectory, Notebook, NotebookCommitService, NotebookDirectory,
    SessionConfig, SessionHandle, SessionView, SqliteDraftStore,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

const RUNTIME_WORKER_THREADS: usize = 2;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static SESSION: Mutex<Option<SessionHandle>> = Mutex::new(None);
static SHELL: Mutex<Option<ShellState>> = Mutex::new(None);

/// Collaborators behind the stateless host-shell calls.
#[derive(Clone)]
struct ShellState {
    root: PathBuf,
    store: SqliteDraftStore,
    writer: DraftWriter,
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Resolved application paths, for UIs that start a session with defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigResponse {
    pub ok: bool,
    pub root: String,
    pub state_db: String,
    pub log_dir: Option<String>,
    pub autosave_delay_ms: u64,
    pub message: String,
}

/// Resolves configuration from `JUSTWRITE_*` variables and the config file.
#[flutter_rust_bridge::frb(sync)]
pub fn app_config() -> ConfigResponse {
    match AppConfig::from_env() {
        Ok(config) => ConfigResponse {
            ok: true,
            root: config.root.display().to_string(),
            state_db: config.state_db.display().to_string(),
            log_dir: config.log_dir.map(|dir| dir.display().to_string()),
            autosave_delay_ms: config.autosave_delay_ms,
            message: String::new(),
        },
        Err(err) => ConfigResponse {
            ok: false,
            root: String::new(),
            state_db: String::new(),
            log_dir: None,
            autosave_delay_ms: 0,
            message: format!("app_config failed: {err}"),
        },
    }
}

/// UI mirror of the running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// False when no session is running or the call failed.
    pub ok: bool,
    /// `uninitialized|ready|terminating|terminated`.
    pub phase: String,
    pub text: String,
    pub notebook_id: String,
    pub notebooks: Vec<String>,
    /// Status indicator text; empty when idle.
    pub status: String,
    pub status_is_error: bool,
    /// Diagnostics for failed calls.
    pub message: String,
}

impl SessionSnapshot {
    fn from_view(view: SessionView) -> Self {
        Self {
            ok: true,
            phase: format!("{:?}", view.phase).to_ascii_lowercase(),
            text: view.draft.text,
            notebook_id: view.draft.notebook_id,
            notebooks: view.notebooks,
            status: view.status.message(),
            status_is_error: view.status.is_error(),
            message: String::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            phase: String::new(),
            text: String::new(),
            notebook_id: String::new(),
            notebooks: Vec::new(),
            status: String::new(),
            status_is_error: true,
            message: message.into(),
        }
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    fn from_result(result: Result<(), String>, message: &str) -> Self {
        match result {
            Ok(()) => Self::success(message),
            Err(err) => Self::failure(err),
        }
    }
}

/// Result of a commit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResponse {
    /// True only when the entry is durable.
    pub ok: bool,
    /// `committed|rejected|failed|busy`.
    pub outcome: String,
    /// False when the draft was edited during the commit and kept.
    pub cleared: bool,
    pub message: String,
}

impl CommitResponse {
    fn from_outcome(outcome: CommitOutcome) -> Self {
        match outcome {
            CommitOutcome::Committed { notebook_id, cleared } => Self {
                ok: true,
                outcome: "committed".to_string(),
                cleared,
                message: format!("Saved to {notebook_id}."),
            },
            CommitOutcome::Rejected(reason) => Self::failure("rejected", reason),
            CommitOutcome::Failed(err) => Self::failure("failed", err),
            CommitOutcome::Busy => Self::failure("busy", "a commit is already running"),
        }
    }

    fn failure(outcome: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            outcome: outcome.to_string(),
            cleared: false,
            message: message.into(),
        }
    }
}

/// Starts the session: opens the state database, restores the draft and
/// lists notebooks under `root`.
///
/// # FFI contract
/// - Sync call; blocks until the persisted draft is loaded.
/// - Idempotent: a running session is returned unchanged.
/// - `autosave_delay_ms = None` uses the default quiet period.
#[flutter_rust_bridge::frb(sync)]
pub fn session_start(
    root: String,
    state_db: String,
    autosave_delay_ms: Option<u64>,
) -> SessionSnapshot {
    let mut slot = match lock(&SESSION) {
        Ok(slot) => slot,
        Err(err) => return SessionSnapshot::failure(err),
    };
    if let Some(handle) = slot.as_ref().filter(|handle| !handle.is_closed()) {
        return SessionSnapshot::from_view(handle.view());
    }

    let root = match normalize_path("root", &root) {
        Ok(root) => root,
        Err(err) => return SessionSnapshot::failure(err),
    };
    let state_db = match normalize_path("state_db", &state_db) {
        Ok(path) => path,
        Err(err) => return SessionSnapshot::failure(err),
    };
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(err) => return SessionSnapshot::failure(err),
    };
    let store = match SqliteDraftStore::open(&state_db) {
        Ok(store) => store,
        Err(err) => return SessionSnapshot::failure(format!("session_start failed: {err}")),
    };
    let config = autosave_delay_ms.map_or_else(SessionConfig::default, |delay| SessionConfig {
        autosave_delay: Duration::from_millis(delay),
    });

    let handle = runtime.block_on(start_session(
        store,
        NotebookCommitService::new(&root),
        FsNotebookDirectory::new(&root),
        config,
    ));
    info!(
        "event=session_start module=ffi status=ok root={}",
        root.display()
    );
    let snapshot = SessionSnapshot::from_view(handle.view());
    *slot = Some(handle);
    snapshot
}

/// Latest published session state.
#[flutter_rust_bridge::frb(sync)]
pub fn session_snapshot() -> SessionSnapshot {
    match current_session() {
        Ok(handle) => SessionSnapshot::from_view(handle.view()),
        Err(err) => SessionSnapshot::failure(err),
    }
}

/// Forwards a text edit. Returns immediately; autosave follows.
#[flutter_rust_bridge::frb(sync)]
pub fn session_edit(text: String) -> ActionResponse {
    let result = current_session().and_then(|handle| {
        handle
            .edit(text)
            .map_err(|err| format!("session_edit failed: {err}"))
    });
    ActionResponse::from_result(result, "")
}

/// Forwards a notebook selector change.
#[flutter_rust_bridge::frb(sync)]
pub fn session_select_notebook(notebook_id: String) -> ActionResponse {
    let result = current_session().and_then(|handle| {
        handle
            .select_notebook(notebook_id)
            .map_err(|err| format!("session_select_notebook failed: {err}"))
    });
    ActionResponse::from_result(result, "")
}

/// Commits the current draft and waits for the outcome.
#[flutter_rust_bridge::frb(sync)]
pub fn session_commit() -> CommitResponse {
    let result = current_session().and_then(|handle| {
        let runtime = runtime()?;
        runtime
            .block_on(handle.commit())
            .map_err(|err| format!("session_commit failed: {err}"))
    });
    match result {
        Ok(outcome) => CommitResponse::from_outcome(outcome),
        Err(err) => CommitResponse::failure("failed", err),
    }
}

/// Re-lists notebooks and returns the refreshed state.
#[flutter_rust_bridge::frb(sync)]
pub fn session_refresh_notebooks() -> SessionSnapshot {
    let result = current_session().and_then(|handle| {
        let runtime = runtime()?;
        runtime
            .block_on(handle.refresh_notebooks())
            .map_err(|err| format!("session_refresh_notebooks failed: {err}"))?;
        Ok(handle.view())
    });
    match result {
        Ok(view) => SessionSnapshot::from_view(view),
        Err(err) => SessionSnapshot::failure(err),
    }
}

/// Opens the selected notebook's folder. Failures surface in the status.
#[flutter_rust_bridge::frb(sync)]
pub fn session_open_location() -> ActionResponse {
    let result = current_session().and_then(|handle| {
        handle
            .open_location()
            .map_err(|err| format!("session_open_location failed: {err}"))
    });
    ActionResponse::from_result(result, "")
}

/// Flushes pending autosave writes and stops the session. Idempotent.
#[flutter_rust_bridge::frb(sync)]
pub fn session_terminate() -> ActionResponse {
    let handle = match lock(&SESSION) {
        Ok(mut slot) => slot.take(),
        Err(err) => return ActionResponse::failure(err),
    };
    let Some(handle) = handle else {
        return ActionResponse::success("No session running.");
    };
    let result = runtime().and_then(|runtime| {
        runtime
            .block_on(handle.terminate())
            .map_err(|err| format!("session_terminate failed: {err}"))
    });
    info!("event=session_stop module=ffi status=ok");
    ActionResponse::from_result(result, "Session terminated.")
}

/// Points the host-shell calls at a notebook root and state database.
///
/// # FFI contract
/// - Must be called before the other shell calls; reconfiguring replaces
///   the previous paths.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn shell_configure(root: String, state_db: String) -> String {
    let configured = (|| -> Result<ShellState, String> {
        let root = normalize_path("root", &root)?;
        let state_db = normalize_path("state_db", &state_db)?;
        let store = SqliteDraftStore::open(&state_db)
            .map_err(|err| format!("shell_configure failed: {err}"))?;
        let writer = DraftWriter::spawn(runtime()?.handle(), store.clone());
        Ok(ShellState {
            root,
            store,
            writer,
        })
    })();
    match configured.and_then(|state| {
        *lock(&SHELL)? = Some(state);
        Ok(())
    }) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Notebook listing envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookListResponse {
    pub ok: bool,
    pub notebooks: Vec<String>,
    pub message: String,
}

/// Lists notebook ids under the configured root, sorted.
#[flutter_rust_bridge::frb(sync)]
pub fn notebook_list() -> NotebookListResponse {
    let result = shell().and_then(|(runtime, state)| {
        runtime
            .block_on(FsNotebookDirectory::new(&state.root).list())
            .map_err(|err| format!("notebook_list failed: {err}"))
    });
    match result {
        Ok(notebooks) => NotebookListResponse {
            ok: true,
            notebooks,
            message: String::new(),
        },
        Err(err) => NotebookListResponse {
            ok: false,
            notebooks: Vec::new(),
            message: err,
        },
    }
}

/// Opens a notebook's folder in the platform file manager.
#[flutter_rust_bridge::frb(sync)]
pub fn open_notebook_location(notebook_id: String) -> ActionResponse {
    let result = shell().and_then(|(runtime, state)| {
        runtime
            .block_on(FsNotebookDirectory::new(&state.root).open_location(notebook_id))
            .map_err(|err| format!("open_notebook_location failed: {err}"))
    });
    ActionResponse::from_result(result, "Opened.")
}

/// Queues an autosave of `{notebook_id, text}` and returns immediately.
///
/// # FFI contract
/// - Fire-and-forget: write failures are logged, not returned.
/// - Writes land in call order; a burst of calls persists the last one.
/// - `ok=false` only when the shell is not configured.
#[flutter_rust_bridge::frb(sync)]
pub fn persist_draft(notebook_id: String, text: String) -> ActionResponse {
    let result = shell().and_then(|(_, state)| state.writer.queue(Draft::new(text, notebook_id)));
    ActionResponse::from_result(result, "Queued.")
}

/// Persisted draft envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftResponse {
    pub ok: bool,
    pub text: String,
    pub notebook_id: String,
    pub message: String,
}

/// Reads the persisted draft; an empty draft when none was saved.
///
/// Waits for drafts queued by `persist_draft` to be written first.
#[flutter_rust_bridge::frb(sync)]
pub fn load_draft() -> DraftResponse {
    let result = shell().and_then(|(runtime, state)| {
        runtime.block_on(async {
            state.writer.flush().await?;
            state
                .store
                .load()
                .await
                .map_err(|err| format!("load_draft failed: {err}"))
        })
    });
    match result {
        Ok(draft) => DraftResponse {
            ok: true,
            text: draft.text,
            notebook_id: draft.notebook_id,
            message: String::new(),
        },
        Err(err) => DraftResponse {
            ok: false,
            text: String::new(),
            notebook_id: String::new(),
            message: err,
        },
    }
}

/// Writes `text` as a new entry in `notebook_id`.
///
/// Returns true only when the entry is durable; soft and hard failures both
/// return false and are logged distinctly by the commit service.
#[flutter_rust_bridge::frb(sync)]
pub fn commit_draft(notebook_id: String, text: String) -> bool {
    let result = shell().and_then(|(runtime, state)| {
        runtime
            .block_on(NotebookCommitService::new(&state.root).commit(notebook_id, text))
            .map_err(|err| format!("commit_draft failed: {err}"))
    });
    match result {
        Ok(committed) => committed,
        Err(err) => {
            warn!("event=commit_draft module=ffi status=error error={err}");
            false
        }
    }
}

/// Creates a notebook under the configured root.
#[flutter_rust_bridge::frb(sync)]
pub fn notebook_create(notebook_id: String) -> ActionResponse {
    let result = shell().and_then(|(_, state)| {
        Notebook::generate(&state.root, &notebook_id)
            .map(|_| ())
            .map_err(|err| format!("notebook_create failed: {err}"))
    });
    ActionResponse::from_result(result, "Notebook created.")
}

fn runtime() -> Result<&'static Runtime, String> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let built = Builder::new_multi_thread()
        .worker_threads(RUNTIME_WORKER_THREADS)
        .thread_name("justwrite-ffi")
        .enable_all()
        .build()
        .map_err(|err| format!("failed to start async runtime: {err}"))?;
    // A racing initializer may win; the loser's runtime is dropped unused.
    Ok(RUNTIME.get_or_init(|| built))
}

fn lock<T>(mutex: &'static Mutex<T>) -> Result<MutexGuard<'static, T>, String> {
    mutex
        .lock()
        .map_err(|_| "internal state lock poisoned".to_string())
}

fn current_session() -> Result<SessionHandle, String> {
    lock(&SESSION)?
        .clone()
        .ok_or_else(|| "session not started".to_string())
}

fn shell() -> Result<(&'static Runtime, ShellState), String> {
    let state = lock(&SHELL)?
        .clone()
        .ok_or_else(|| "shell not configured".to_string())?;
    Ok((runtime()?, state))
}

fn normalize_path(name: &str, raw: &str) -> Result<PathBuf, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(format!("{name} cannot be empty"));
    }
    Ok(PathBuf::from(trimmed))
}
