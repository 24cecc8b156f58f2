//! In-memory collaborators for session tests.
//!
//! Each fake can be gated with a semaphore so a test holds an operation
//! in flight, and exposes watch counters to await progress without sleeps.

#![allow(dead_code)]

use justwrite_core::notebook::NotebookResult;
use justwrite_core::{
    CommitError, CommitResult, CommitService, Draft, DraftStore, NotebookDirectory,
    NotebookError, NotebookId, StoreError, StoreResult,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

async fn wait_count(counter: &watch::Sender<usize>, at_least: usize) {
    let mut rx = counter.subscribe();
    tokio::time::timeout(WAIT_LIMIT, rx.wait_for(|count| *count >= at_least))
        .await
        .expect("timed out waiting for fake progress")
        .expect("counter sender dropped");
}

async fn pass_gate(gate: &Option<Arc<Semaphore>>) {
    if let Some(gate) = gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Load,
    Save(Draft),
    Clear,
}

/// Draft store keeping state in memory.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    draft: Mutex<Draft>,
    ops: Mutex<Vec<StoreOp>>,
    gate: Option<Arc<Semaphore>>,
    fail_writes: AtomicBool,
    fail_load: AtomicBool,
    active: AtomicUsize,
    max_active: AtomicUsize,
    writes_done: watch::Sender<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::build(Draft::default(), None)
    }

    pub fn with_draft(draft: Draft) -> Self {
        Self::build(draft, None)
    }

    /// Writes block until `release` hands out permits.
    pub fn gated(draft: Draft) -> Self {
        Self::build(draft, Some(Arc::new(Semaphore::new(0))))
    }

    fn build(draft: Draft, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                draft: Mutex::new(draft),
                ops: Mutex::new(Vec::new()),
                gate,
                fail_writes: AtomicBool::new(false),
                fail_load: AtomicBool::new(false),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                writes_done: watch::channel(0).0,
            }),
        }
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.inner.gate {
            gate.add_permits(permits);
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_load(&self, fail: bool) {
        self.inner.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn current(&self) -> Draft {
        self.inner.draft.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner.ops.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<Draft> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Save(draft) => Some(draft),
                _ => None,
            })
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_active.load(Ordering::SeqCst)
    }

    /// Waits until `count` save or clear calls have completed.
    pub async fn wait_for_writes(&self, count: usize) {
        wait_count(&self.inner.writes_done, count).await;
    }

    fn write(&self, op: StoreOp) -> impl Future<Output = StoreResult<()>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.ops.lock().unwrap().push(op.clone());
            let active = inner.active.fetch_add(1, Ordering::SeqCst) + 1;
            inner.max_active.fetch_max(active, Ordering::SeqCst);

            pass_gate(&inner.gate).await;

            let result = if inner.fail_writes.load(Ordering::SeqCst) {
                Err(StoreError::Task("disk full".to_string()))
            } else {
                let mut draft = inner.draft.lock().unwrap();
                match op {
                    StoreOp::Save(next) => *draft = next,
                    StoreOp::Clear => *draft = Draft::default(),
                    StoreOp::Load => {}
                }
                Ok(())
            };

            inner.active.fetch_sub(1, Ordering::SeqCst);
            inner.writes_done.send_modify(|count| *count += 1);
            result
        }
    }
}

impl DraftStore for MemoryStore {
    fn save(&self, draft: Draft) -> impl Future<Output = StoreResult<()>> + Send {
        self.write(StoreOp::Save(draft))
    }

    fn load(&self) -> impl Future<Output = StoreResult<Draft>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.ops.lock().unwrap().push(StoreOp::Load);
            if inner.fail_load.load(Ordering::SeqCst) {
                return Err(StoreError::Task("corrupt state".to_string()));
            }
            Ok(inner.draft.lock().unwrap().clone())
        }
    }

    fn clear(&self) -> impl Future<Output = StoreResult<()>> + Send {
        self.write(StoreOp::Clear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitBehavior {
    Accept,
    Reject,
    Fail,
}

/// Commit service recording every call.
#[derive(Clone)]
pub struct RecordingCommits {
    inner: Arc<CommitsInner>,
}

struct CommitsInner {
    behavior: Mutex<CommitBehavior>,
    calls: Mutex<Vec<(NotebookId, String)>>,
    gate: Option<Arc<Semaphore>>,
    started: watch::Sender<usize>,
}

impl RecordingCommits {
    pub fn new(behavior: CommitBehavior) -> Self {
        Self::build(behavior, None)
    }

    /// Commits block until `release` hands out permits.
    pub fn gated(behavior: CommitBehavior) -> Self {
        Self::build(behavior, Some(Arc::new(Semaphore::new(0))))
    }

    fn build(behavior: CommitBehavior, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            inner: Arc::new(CommitsInner {
                behavior: Mutex::new(behavior),
                calls: Mutex::new(Vec::new()),
                gate,
                started: watch::channel(0).0,
            }),
        }
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.inner.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> Vec<(NotebookId, String)> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub async fn wait_for_started(&self, count: usize) {
        wait_count(&self.inner.started, count).await;
    }
}

impl CommitService for RecordingCommits {
    fn commit(
        &self,
        notebook_id: NotebookId,
        text: String,
    ) -> impl Future<Output = CommitResult<bool>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.calls.lock().unwrap().push((notebook_id, text));
            inner.started.send_modify(|count| *count += 1);
            pass_gate(&inner.gate).await;

            let behavior = *inner.behavior.lock().unwrap();
            match behavior {
                CommitBehavior::Accept => Ok(true),
                CommitBehavior::Reject => Ok(false),
                CommitBehavior::Fail => Err(CommitError::Notebook(NotebookError::Io(
                    std::io::Error::other("disk full"),
                ))),
            }
        }
    }
}

/// Notebook directory over a fixed, replaceable id list.
#[derive(Clone)]
pub struct StaticDirectory {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    ids: Mutex<Vec<NotebookId>>,
    fail_list: AtomicBool,
    fail_open: AtomicBool,
    opened: Mutex<Vec<NotebookId>>,
    open_calls: watch::Sender<usize>,
}

impl StaticDirectory {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                ids: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
                fail_list: AtomicBool::new(false),
                fail_open: AtomicBool::new(false),
                opened: Mutex::new(Vec::new()),
                open_calls: watch::channel(0).0,
            }),
        }
    }

    pub fn set_ids(&self, ids: &[&str]) {
        *self.inner.ids.lock().unwrap() = ids.iter().map(|id| id.to_string()).collect();
    }

    pub fn fail_list(&self, fail: bool) {
        self.inner.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<NotebookId> {
        self.inner.opened.lock().unwrap().clone()
    }

    pub async fn wait_for_opens(&self, count: usize) {
        wait_count(&self.inner.open_calls, count).await;
    }
}

impl NotebookDirectory for StaticDirectory {
    fn list(&self) -> impl Future<Output = NotebookResult<Vec<NotebookId>>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            if inner.fail_list.load(Ordering::SeqCst) {
                return Err(NotebookError::Io(std::io::Error::other("root unreadable")));
            }
            Ok(inner.ids.lock().unwrap().clone())
        }
    }

    fn open_location(&self, id: NotebookId) -> impl Future<Output = NotebookResult<()>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            let result = if inner.fail_open.load(Ordering::SeqCst) {
                Err(NotebookError::NotFound(id.clone()))
            } else {
                Ok(())
            };
            inner.opened.lock().unwrap().push(id);
            inner.open_calls.send_modify(|count| *count += 1);
            result
        }
    }
}
