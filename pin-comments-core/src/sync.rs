//! Propagation of local mutations to the remote table.
//!
//! Every mutation of the comment set yields a [`SyncOp`] describing what the
//! remote store must do to catch up. [`propagate`] performs one op and wraps
//! the result in a [`SyncOutcome`], which the state model folds back in
//! (status bookkeeping, delete rollback).
//!
//! Callers that must not wait on the network hand ops to a background task
//! started with [`spawn_sync_worker`]. The task owns its copy of the remote
//! client, processes ops strictly in submission order, and sends each outcome
//! back over an unbounded tokio MPSC channel.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::RemoteError;
use crate::remote::{CommentPatch, RemoteStore};
use crate::types::{Comment, Reply};

/// Remote work implied by one local mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    /// Insert a newly created comment.
    Insert(Comment),
    /// Delete a comment. Carries the removed value and its former index so a
    /// failed delete can be rolled back in place.
    Remove { comment: Comment, index: usize },
    /// Overwrite a comment's whole reply list. Replies are never appended
    /// remotely.
    ReplaceReplies { comment_id: String, replies: Vec<Reply> },
}

impl SyncOp {
    /// Identity of the comment this op concerns.
    pub fn comment_id(&self) -> &str {
        match self {
            SyncOp::Insert(c) => &c.id,
            SyncOp::Remove { comment, .. } => &comment.id,
            SyncOp::ReplaceReplies { comment_id, .. } => comment_id,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            SyncOp::Insert(_) => "save comment",
            SyncOp::Remove { .. } => "delete comment",
            SyncOp::ReplaceReplies { .. } => "save replies",
        }
    }
}

/// Result of pushing one [`SyncOp`] to the remote store.
#[derive(Debug)]
pub struct SyncOutcome {
    pub op: SyncOp,
    pub result: Result<(), RemoteError>,
}

/// Remote state of a comment relative to the last local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Changed locally, remote write not finished.
    Pending,
    /// Remote store acknowledged the last change.
    Confirmed,
    /// Last remote write failed; local state is kept as the truth.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tracked {
    /// Ops applied locally whose outcome has not come back yet.
    in_flight: usize,
    /// The insert failed, so the remote table has no row to update.
    row_missing: bool,
    /// The latest finished patch or delete failed.
    write_failed: bool,
}

impl Tracked {
    fn status(self) -> SyncStatus {
        if self.row_missing {
            SyncStatus::Failed
        } else if self.in_flight > 0 {
            SyncStatus::Pending
        } else if self.write_failed {
            SyncStatus::Failed
        } else {
            SyncStatus::Confirmed
        }
    }
}

/// Per-comment bookkeeping behind [`SyncStatus`].
///
/// A comment only reads `Confirmed` once every op issued for it has finished
/// and the last of them succeeded. A failed insert keeps it `Failed` until
/// the row is seen remotely: later patches against a missing row succeed
/// without storing anything.
#[derive(Debug, Default)]
pub struct SyncLedger {
    entries: HashMap<String, Tracked>,
}

impl SyncLedger {
    pub fn status(&self, id: &str) -> Option<SyncStatus> {
        self.entries.get(id).map(|t| t.status())
    }

    /// Records an op for `id` that has been applied locally.
    pub fn issued(&mut self, id: &str) {
        self.entries.entry(id.to_owned()).or_default().in_flight += 1;
    }

    /// Records the outcome of `op`. Outcomes for untracked ids are ignored.
    pub fn finished(&mut self, op: &SyncOp, succeeded: bool) {
        let id = op.comment_id();
        let Some(t) = self.entries.get_mut(id) else {
            return;
        };
        t.in_flight = t.in_flight.saturating_sub(1);
        match op {
            SyncOp::Insert(_) => t.row_missing = !succeeded,
            SyncOp::Remove { .. } if succeeded => {
                self.entries.remove(id);
            }
            SyncOp::Remove { .. } | SyncOp::ReplaceReplies { .. } => t.write_failed = !succeeded,
        }
    }

    /// Records that the remote copy of `id` was just read back, so the
    /// row exists and matches local state.
    pub fn fetched(&mut self, id: &str) {
        let t = self.entries.entry(id.to_owned()).or_default();
        t.row_missing = false;
        t.write_failed = false;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Performs `op` against `remote`. Never retries.
pub async fn propagate<R: RemoteStore>(remote: &R, op: SyncOp) -> SyncOutcome {
    let result = match &op {
        SyncOp::Insert(comment) => remote.add(comment).await.map(|_| ()),
        SyncOp::Remove { comment, .. } => remote.delete(&comment.id).await,
        SyncOp::ReplaceReplies { comment_id, replies } => {
            remote
                .update(comment_id, &CommentPatch::replies(replies.clone()))
                .await
        }
    };
    match &result {
        Ok(()) => tracing::debug!(id = op.comment_id(), "{} synced", op.verb()),
        Err(e) => tracing::error!(id = op.comment_id(), error = %e, "failed to {}", op.verb()),
    }
    SyncOutcome { op, result }
}

/// Channel ends connecting the caller with a running sync worker.
///
/// Dropping the handle closes the op channel; the worker finishes the op in
/// flight (requests are not cancellable) and exits.
pub struct SyncHandle {
    ops: mpsc::UnboundedSender<SyncOp>,
    outcomes: mpsc::UnboundedReceiver<SyncOutcome>,
}

impl SyncHandle {
    /// Queues `op`. Returns `false` if the worker has already stopped.
    pub fn submit(&self, op: SyncOp) -> bool {
        self.ops.send(op).is_ok()
    }

    /// Waits for the next finished op. `None` once the worker has exited and
    /// every outcome was delivered.
    pub async fn next_outcome(&mut self) -> Option<SyncOutcome> {
        self.outcomes.recv().await
    }

    /// Returns a finished outcome if one is ready, without waiting.
    pub fn try_next_outcome(&mut self) -> Option<SyncOutcome> {
        self.outcomes.try_recv().ok()
    }
}

/// Spawns the background task that owns `remote` and drains submitted ops.
///
/// Must be called from within a tokio runtime.
pub fn spawn_sync_worker<R: RemoteStore>(remote: R) -> SyncHandle {
    let (op_tx, mut op_rx) = mpsc::unbounded_channel::<SyncOp>();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(op) = op_rx.recv().await {
            let outcome = propagate(&remote, op).await;
            if outcome_tx.send(outcome).is_err() {
                break;
            }
        }
    });

    SyncHandle { ops: op_tx, outcomes: outcome_rx }
}
