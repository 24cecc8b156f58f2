mod support;

use justwrite_core::{
    start_session, CommitOutcome, Draft, FsNotebookDirectory, Notebook, NotebookCommitService,
    SessionConfig, SessionError, SessionHandle, SessionPhase, SessionStatus, SqliteDraftStore,
};
use std::time::Duration;
use support::{CommitBehavior, MemoryStore, RecordingCommits, StaticDirectory, StoreOp};

async fn immediate_session(
    store: &MemoryStore,
    commits: &RecordingCommits,
    directory: &StaticDirectory,
) -> SessionHandle {
    start_session(
        store.clone(),
        commits.clone(),
        directory.clone(),
        SessionConfig::immediate(),
    )
    .await
}

fn accepting() -> RecordingCommits {
    RecordingCommits::new(CommitBehavior::Accept)
}

#[tokio::test]
async fn startup_restores_persisted_draft_and_notebooks() {
    let store = MemoryStore::with_draft(Draft::new("hello", "work"));
    let directory = StaticDirectory::new(&["daily", "work"]);
    let session = immediate_session(&store, &accepting(), &directory).await;

    let view = session.view();
    assert_eq!(view.phase, SessionPhase::Ready);
    assert_eq!(view.draft, Draft::new("hello", "work"));
    assert_eq!(view.notebooks, vec!["daily".to_string(), "work".to_string()]);
    assert_eq!(view.status, SessionStatus::Loaded);
    assert_eq!(store.ops(), vec![StoreOp::Load]);
}

#[tokio::test]
async fn load_happens_before_first_save() {
    let store = MemoryStore::with_draft(Draft::new("restored", "work"));
    let session = immediate_session(&store, &accepting(), &StaticDirectory::new(&[])).await;

    session.edit("restored and more").unwrap();
    session.flush().await.unwrap();

    assert_eq!(
        store.ops(),
        vec![
            StoreOp::Load,
            StoreOp::Save(Draft::new("restored and more", "work")),
        ]
    );
}

#[tokio::test]
async fn load_failure_still_reaches_ready_with_empty_draft() {
    let store = MemoryStore::new();
    store.fail_load(true);
    let session = immediate_session(&store, &accepting(), &StaticDirectory::new(&[])).await;

    let view = session.view();
    assert_eq!(view.phase, SessionPhase::Ready);
    assert_eq!(view.draft, Draft::default());
    assert!(matches!(view.status, SessionStatus::LoadFailed(_)));

    session.edit("fresh").unwrap();
    session.flush().await.unwrap();
    assert_eq!(store.current(), Draft::new("fresh", ""));
}

#[tokio::test]
async fn rapid_edits_coalesce_into_one_trailing_save() {
    let store = MemoryStore::gated(Draft::default());
    let session = immediate_session(&store, &accepting(), &StaticDirectory::new(&[])).await;

    for text in ["a", "ab", "abc", "abcd"] {
        session.edit(text).unwrap();
    }
    assert_eq!(session.draft().await.unwrap().text, "abcd");

    store.release(10);
    session.flush().await.unwrap();

    assert_eq!(
        store.saves(),
        vec![Draft::new("a", ""), Draft::new("abcd", "")]
    );
    assert_eq!(store.max_in_flight(), 1);
    assert_eq!(store.current(), Draft::new("abcd", ""));
}

#[tokio::test]
async fn identical_edit_and_selection_do_not_write() {
    let store = MemoryStore::with_draft(Draft::new("same", "work"));
    let session = immediate_session(&store, &accepting(), &StaticDirectory::new(&[])).await;

    session.edit("same").unwrap();
    session.select_notebook("work").unwrap();
    session.flush().await.unwrap();

    assert_eq!(store.ops(), vec![StoreOp::Load]);
}

#[tokio::test]
async fn selecting_notebook_is_autosaved() {
    let store = MemoryStore::with_draft(Draft::new("text", ""));
    let session = immediate_session(&store, &accepting(), &StaticDirectory::new(&["work"])).await;

    session.select_notebook("work").unwrap();
    session.flush().await.unwrap();

    assert_eq!(store.current(), Draft::new("text", "work"));
    assert_eq!(session.view().status, SessionStatus::Saved);
}

#[tokio::test]
async fn successful_commit_clears_draft_in_memory_and_store() {
    let store = MemoryStore::with_draft(Draft::new("note", "work"));
    let commits = accepting();
    let session = immediate_session(&store, &commits, &StaticDirectory::new(&["work"])).await;

    let outcome = session.commit().await.unwrap();
    assert_eq!(
        outcome,
        CommitOutcome::Committed {
            notebook_id: "work".to_string(),
            cleared: true,
        }
    );
    assert_eq!(session.view().draft, Draft::new("", "work"));
    assert_eq!(session.view().status.message(), "Saved!");

    session.flush().await.unwrap();
    assert_eq!(store.current(), Draft::new("", "work"));
    assert_eq!(commits.calls(), vec![("work".to_string(), "note".to_string())]);
}

#[tokio::test]
async fn commit_without_notebook_is_rejected_and_keeps_draft() {
    let root = tempfile::tempdir().unwrap();
    let store = MemoryStore::with_draft(Draft::new("text", ""));
    let session = start_session(
        store.clone(),
        NotebookCommitService::new(root.path()),
        StaticDirectory::new(&[]),
        SessionConfig::immediate(),
    )
    .await;

    let outcome = session.commit().await.unwrap();
    assert_eq!(
        outcome,
        CommitOutcome::Rejected("no notebook selected".to_string())
    );
    assert_eq!(session.view().draft, Draft::new("text", ""));
    assert!(session.view().status.is_error());

    session.flush().await.unwrap();
    assert_eq!(store.ops(), vec![StoreOp::Load]);
}

#[tokio::test]
async fn failed_commit_preserves_draft() {
    let store = MemoryStore::with_draft(Draft::new("keep me", "work"));
    let commits = RecordingCommits::new(CommitBehavior::Fail);
    let session = immediate_session(&store, &commits, &StaticDirectory::new(&["work"])).await;

    let outcome = session.commit().await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Failed(_)));

    let view = session.view();
    assert_eq!(view.draft, Draft::new("keep me", "work"));
    assert!(matches!(view.status, SessionStatus::CommitFailed(_)));
    assert_eq!(view.status.message(), "Failed to save");

    session.flush().await.unwrap();
    assert_eq!(store.ops(), vec![StoreOp::Load]);
    assert_eq!(store.current(), Draft::new("keep me", "work"));
}

#[tokio::test]
async fn soft_failure_from_service_keeps_draft() {
    let store = MemoryStore::with_draft(Draft::new("draft", "work"));
    let commits = RecordingCommits::new(CommitBehavior::Reject);
    let session = immediate_session(&store, &commits, &StaticDirectory::new(&["work"])).await;

    let outcome = session.commit().await.unwrap();
    assert_eq!(outcome, CommitOutcome::Rejected("commit declined".to_string()));
    assert_eq!(session.view().draft, Draft::new("draft", "work"));
}

#[tokio::test]
async fn late_autosave_cannot_resurrect_committed_text() {
    let store = MemoryStore::gated(Draft::new("", "work"));
    let commits = accepting();
    let session = immediate_session(&store, &commits, &StaticDirectory::new(&["work"])).await;

    session.edit("final words").unwrap();
    let outcome = session.commit().await.unwrap();
    assert!(outcome.is_committed());

    store.release(10);
    session.flush().await.unwrap();

    assert_eq!(
        store.ops(),
        vec![
            StoreOp::Load,
            StoreOp::Save(Draft::new("final words", "work")),
            StoreOp::Clear,
            StoreOp::Save(Draft::new("", "work")),
        ]
    );
    assert_eq!(store.current(), Draft::new("", "work"));
    assert_eq!(store.max_in_flight(), 1);
}

#[tokio::test]
async fn edit_during_commit_keeps_newer_text() {
    let store = MemoryStore::with_draft(Draft::new("v1", "work"));
    let commits = RecordingCommits::gated(CommitBehavior::Accept);
    let session = immediate_session(&store, &commits, &StaticDirectory::new(&["work"])).await;

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.commit().await }
    });
    commits.wait_for_started(1).await;

    session.edit("v2").unwrap();
    assert_eq!(session.draft().await.unwrap().text, "v2");

    commits.release(1);
    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        CommitOutcome::Committed {
            notebook_id: "work".to_string(),
            cleared: false,
        }
    );

    session.flush().await.unwrap();
    assert_eq!(session.view().draft, Draft::new("v2", "work"));
    assert_eq!(store.current(), Draft::new("v2", "work"));
    assert_eq!(commits.calls(), vec![("work".to_string(), "v1".to_string())]);
}

#[tokio::test]
async fn second_commit_while_first_runs_is_busy() {
    let store = MemoryStore::with_draft(Draft::new("once", "work"));
    let commits = RecordingCommits::gated(CommitBehavior::Accept);
    let session = immediate_session(&store, &commits, &StaticDirectory::new(&["work"])).await;

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.commit().await }
    });
    commits.wait_for_started(1).await;

    assert_eq!(session.commit().await.unwrap(), CommitOutcome::Busy);

    commits.release(1);
    assert!(first.await.unwrap().unwrap().is_committed());
    assert_eq!(commits.calls().len(), 1);
}

#[tokio::test]
async fn refresh_reflects_directory_changes_and_survives_failures() {
    let store = MemoryStore::new();
    let directory = StaticDirectory::new(&["a"]);
    let session = immediate_session(&store, &accepting(), &directory).await;
    assert_eq!(session.view().notebooks, vec!["a".to_string()]);

    directory.set_ids(&["a", "b"]);
    let listed = session.refresh_notebooks().await.unwrap();
    assert_eq!(listed, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(session.refresh_notebooks().await.unwrap(), listed);

    directory.fail_list(true);
    assert_eq!(session.refresh_notebooks().await.unwrap(), listed);
    assert!(matches!(
        session.view().status,
        SessionStatus::ListFailed(_)
    ));
}

#[tokio::test]
async fn open_location_uses_selected_notebook() {
    let directory = StaticDirectory::new(&["work"]);
    let session = immediate_session(&MemoryStore::new(), &accepting(), &directory).await;

    session.open_location().unwrap();
    session.draft().await.unwrap();
    assert!(matches!(
        session.view().status,
        SessionStatus::OpenFailed(_)
    ));
    assert!(directory.opened().is_empty());

    session.select_notebook("work").unwrap();
    session.open_location().unwrap();
    directory.wait_for_opens(1).await;
    assert_eq!(directory.opened(), vec!["work".to_string()]);
}

#[tokio::test]
async fn open_location_failure_surfaces_as_status() {
    let directory = StaticDirectory::new(&[]);
    directory.fail_open(true);
    let session = immediate_session(&MemoryStore::new(), &accepting(), &directory).await;

    let mut view = session.subscribe();
    session.open_notebook_location("ghost").unwrap();
    let changed = tokio::time::timeout(
        Duration::from_secs(5),
        view.wait_for(|view| matches!(view.status, SessionStatus::OpenFailed(_))),
    )
    .await
    .unwrap();
    assert!(changed.is_ok());
}

#[tokio::test]
async fn save_failure_is_reported_and_next_edit_retries() {
    let store = MemoryStore::new();
    let session = immediate_session(&store, &accepting(), &StaticDirectory::new(&[])).await;

    store.fail_writes(true);
    session.edit("x").unwrap();
    session.flush().await.unwrap();
    assert!(matches!(
        session.view().status,
        SessionStatus::SaveFailed(_)
    ));

    store.fail_writes(false);
    session.edit("xy").unwrap();
    session.flush().await.unwrap();
    assert_eq!(session.view().status, SessionStatus::Saved);
    assert_eq!(store.current(), Draft::new("xy", ""));
}

#[tokio::test]
async fn failed_clear_after_commit_is_retried_on_terminate() {
    let store = MemoryStore::with_draft(Draft::new("note", "work"));
    let session = immediate_session(&store, &accepting(), &StaticDirectory::new(&["work"])).await;
    let mut view = session.subscribe();

    store.fail_writes(true);
    let outcome = session.commit().await.unwrap();
    assert!(matches!(
        outcome,
        CommitOutcome::Committed { cleared: true, .. }
    ));
    let failed = tokio::time::timeout(
        Duration::from_secs(5),
        view.wait_for(|view| matches!(view.status, SessionStatus::SaveFailed(_))),
    )
    .await
    .unwrap()
    .map(|_| ());
    assert!(failed.is_ok());
    assert_eq!(store.current(), Draft::new("note", "work"));

    store.fail_writes(false);
    session.terminate().await.unwrap();
    assert_eq!(store.current(), Draft::new("", "work"));
    assert_eq!(
        store.ops().last(),
        Some(&StoreOp::Save(Draft::new("", "work")))
    );
}

#[tokio::test(start_paused = true)]
async fn debounce_waits_for_quiet_period() {
    let store = MemoryStore::new();
    let session = start_session(
        store.clone(),
        accepting(),
        StaticDirectory::new(&[]),
        SessionConfig {
            autosave_delay: Duration::from_millis(300),
        },
    )
    .await;

    for text in ["a", "ab", "abc"] {
        session.edit(text).unwrap();
    }
    session.draft().await.unwrap();
    assert!(store.saves().is_empty());

    store.wait_for_writes(1).await;
    assert_eq!(store.saves(), vec![Draft::new("abc", "")]);
}

#[tokio::test]
async fn flush_skips_quiet_period() {
    let store = MemoryStore::new();
    let session = start_session(
        store.clone(),
        accepting(),
        StaticDirectory::new(&[]),
        SessionConfig {
            autosave_delay: Duration::from_secs(3600),
        },
    )
    .await;

    session.edit("now").unwrap();
    session.flush().await.unwrap();
    assert_eq!(store.current(), Draft::new("now", ""));
}

#[tokio::test]
async fn terminate_flushes_pending_writes_and_closes() {
    let store = MemoryStore::new();
    let session = start_session(
        store.clone(),
        accepting(),
        StaticDirectory::new(&[]),
        SessionConfig {
            autosave_delay: Duration::from_secs(3600),
        },
    )
    .await;

    session.edit("pending").unwrap();
    session.terminate().await.unwrap();

    assert_eq!(store.current(), Draft::new("pending", ""));
    assert_eq!(session.view().phase, SessionPhase::Terminated);
    assert_eq!(session.draft().await, Err(SessionError::Closed));
    session.terminate().await.unwrap();
}

#[tokio::test]
async fn dropping_every_handle_flushes_pending_writes() {
    let store = MemoryStore::new();
    let session = start_session(
        store.clone(),
        accepting(),
        StaticDirectory::new(&[]),
        SessionConfig {
            autosave_delay: Duration::from_secs(3600),
        },
    )
    .await;

    session.edit("unsaved").unwrap();
    drop(session);

    store.wait_for_writes(1).await;
    assert_eq!(store.current(), Draft::new("unsaved", ""));
}

#[tokio::test]
async fn end_to_end_commit_and_restart_with_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("notebooks");
    let state_db = dir.path().join("state").join("gui_state.sqlite3");
    let notebook = Notebook::generate(&root, "work").unwrap();

    let session = start_session(
        SqliteDraftStore::open(&state_db).unwrap(),
        NotebookCommitService::new(&root),
        FsNotebookDirectory::with_launcher(&root, "true"),
        SessionConfig::immediate(),
    )
    .await;
    assert_eq!(session.view().notebooks, vec!["work".to_string()]);

    session.select_notebook("work").unwrap();
    session.edit("posted #today").unwrap();
    assert!(session.commit().await.unwrap().is_committed());
    assert_eq!(notebook.posts().unwrap().len(), 1);
    assert_eq!(notebook.tags().unwrap().get("today"), Some(&1));

    session.edit("next thought").unwrap();
    session.terminate().await.unwrap();

    let restarted = start_session(
        SqliteDraftStore::open(&state_db).unwrap(),
        NotebookCommitService::new(&root),
        FsNotebookDirectory::with_launcher(&root, "true"),
        SessionConfig::immediate(),
    )
    .await;
    assert_eq!(restarted.view().draft, Draft::new("next thought", "work"));
    assert_eq!(restarted.view().status, SessionStatus::Loaded);
}
