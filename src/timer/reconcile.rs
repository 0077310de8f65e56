// src/timer/reconcile.rs — Pending remote mutations awaiting confirmation
//
// Saves and deletes hit the local cache first and are queued here. A
// reconciliation pass replays the queue against the Time Store; each op is
// either confirmed, kept for another attempt, or handed back for revert.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use super::notify::SyncOperation;
use super::remote::{with_timeout, TimeStore};
use crate::infra::errors::TrackError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PendingKind {
    Append,
    Remove {
        interval_id: String,
        /// Index the entry occupied in the cache, for reinsertion on revert.
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOp {
    /// Cache entry this op belongs to.
    pub local_id: u64,
    pub task_id: String,
    pub seconds: u64,
    #[serde(flatten)]
    pub kind: PendingKind,
    #[serde(default)]
    pub attempts: u32,
}

impl PendingOp {
    pub fn append(local_id: u64, task_id: &str, seconds: u64) -> Self {
        Self {
            local_id,
            task_id: task_id.to_string(),
            seconds,
            kind: PendingKind::Append,
            attempts: 0,
        }
    }

    pub fn remove(
        local_id: u64,
        task_id: &str,
        seconds: u64,
        interval_id: String,
        position: usize,
    ) -> Self {
        Self {
            local_id,
            task_id: task_id.to_string(),
            seconds,
            kind: PendingKind::Remove {
                interval_id,
                position,
            },
            attempts: 0,
        }
    }

    pub fn operation(&self) -> SyncOperation {
        match self.kind {
            PendingKind::Append => SyncOperation::Save,
            PendingKind::Remove { .. } => SyncOperation::Delete,
        }
    }
}

#[derive(Debug, Default)]
pub struct PendingQueue {
    ops: VecDeque<PendingOp>,
}

impl PendingQueue {
    pub fn from_ops(ops: Vec<PendingOp>) -> Self {
        Self { ops: ops.into() }
    }

    pub fn push(&mut self, op: PendingOp) {
        self.ops.push_back(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drop a not-yet-confirmed append. True if one was pending.
    pub fn cancel_append(&mut self, local_id: u64) -> bool {
        let before = self.ops.len();
        self.ops
            .retain(|op| !(op.local_id == local_id && op.kind == PendingKind::Append));
        self.ops.len() != before
    }

    pub fn take_all(&mut self) -> Vec<PendingOp> {
        self.ops.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOp> {
        self.ops.iter()
    }

    /// Highest cache id referenced by a queued op.
    pub fn max_local_id(&self) -> Option<u64> {
        self.ops.iter().map(|op| op.local_id).max()
    }

    pub fn iter_for_task<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a PendingOp> + 'a {
        self.ops.iter().filter(move |op| op.task_id == task_id)
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub confirmed: usize,
    pub retrying: usize,
    pub reverted: usize,
}

/// Replay one op against the Time Store. Appends yield the new remote id.
pub async fn execute(
    remote: &dyn TimeStore,
    op: &PendingOp,
    timeout: Duration,
) -> Result<Option<String>, TrackError> {
    match &op.kind {
        PendingKind::Append => {
            let interval = with_timeout(
                "append_interval",
                timeout,
                remote.append_interval(&op.task_id, op.seconds),
            )
            .await?;
            Ok(Some(interval.id))
        }
        PendingKind::Remove { interval_id, .. } => {
            let removed = with_timeout(
                "remove_interval",
                timeout,
                remote.remove_interval(&op.task_id, interval_id),
            )
            .await?;
            if !removed {
                tracing::debug!(
                    "Interval {} of task {} was already gone remotely",
                    interval_id,
                    op.task_id
                );
            }
            Ok(None)
        }
    }
}
