//! Serialized draft persistence for the host-shell calls.
//!
//! # Invariants
//! - One task owns the writes: at most one `save` in flight per store.
//! - Queued drafts collapse to the latest one before each write, so the
//!   persisted draft is always the most recently queued.
//! - `flush` resolves only after every draft queued before it is written.

use justwrite_core::{Draft, DraftStore};
use log::warn;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

enum WriterMessage {
    Save(Draft),
    Flush(oneshot::Sender<()>),
}

/// Sender side of the draft writer task. Dropping every clone stops the
/// task once its queue is drained.
#[derive(Clone)]
pub(crate) struct DraftWriter {
    tx: mpsc::UnboundedSender<WriterMessage>,
}

impl DraftWriter {
    /// Spawns the writer task for `store` on `runtime`.
    pub(crate) fn spawn<S>(runtime: &Handle, store: S) -> Self
    where
        S: DraftStore + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_writer(store, rx));
        Self { tx }
    }

    /// Queues `draft`; it replaces any draft still waiting to be written.
    pub(crate) fn queue(&self, draft: Draft) -> Result<(), String> {
        self.tx
            .send(WriterMessage::Save(draft))
            .map_err(|_| "draft writer stopped".to_string())
    }

    /// Waits until everything queued so far has been written.
    pub(crate) async fn flush(&self) -> Result<(), String> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriterMessage::Flush(done_tx))
            .map_err(|_| "draft writer stopped".to_string())?;
        done_rx
            .await
            .map_err(|_| "draft writer stopped".to_string())
    }
}

async fn run_writer<S: DraftStore>(store: S, mut rx: mpsc::UnboundedReceiver<WriterMessage>) {
    while let Some(first) = rx.recv().await {
        let mut latest = None;
        let mut waiters = Vec::new();
        let mut next = Some(first);
        while let Some(message) = next {
            match message {
                WriterMessage::Save(draft) => latest = Some(draft),
                WriterMessage::Flush(done) => waiters.push(done),
            }
            next = rx.try_recv().ok();
        }

        if let Some(draft) = latest {
            if let Err(err) = store.save(draft).await {
                warn!("event=persist_draft module=ffi status=error error={err}");
            }
        }
        for done in waiters {
            let _ = done.send(());
        }
    }
}
