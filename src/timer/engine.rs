// src/timer/engine.rs — Timer state machine
//
// One engine owns at most one timing session. Every command mutates the
// in-memory session first, mirrors the resumable part into local storage,
// and queues remote mutations for the reconciliation pass.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::clock::{elapsed_secs, Clock};
use super::format::format_duration;
use super::local::LocalStorage;
use super::notify::{Notification, Outbox};
use super::persist::{self, PersistedTimer, RunAnchor};
use super::reconcile::{self, PendingKind, PendingOp, PendingQueue, ReconcileSummary};
use super::remote::{with_timeout, TimeStore};
use crate::infra::config::TimerConfig;
use crate::infra::errors::TrackError;
use crate::store::types::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Stopped,
    Running,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub is_running: bool,
    pub seconds: u64,
    pub formatted: String,
    pub selected_task_id: Option<String>,
    pub selected_task_title: Option<String>,
    pub stored_times: Vec<u64>,
    pub total_seconds: u64,
    pub total_formatted: String,
    pub pending_ops: usize,
}

/// One entry of the cached interval history.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedInterval {
    local_id: u64,
    /// `None` until the append that created it is confirmed.
    remote_id: Option<String>,
    seconds: u64,
}

#[derive(Debug, Clone)]
struct Selection {
    task_id: String,
    title: Option<String>,
}

pub struct TimerEngine {
    remote: Arc<dyn TimeStore>,
    storage: Arc<dyn LocalStorage>,
    clock: Arc<dyn Clock>,
    config: TimerConfig,

    selection: Option<Selection>,
    is_running: bool,
    seconds: u64,
    anchor: Option<RunAnchor>,
    cache: Vec<CachedInterval>,
    next_local_id: u64,

    pending: PendingQueue,
    outbox: Outbox,
}

impl TimerEngine {
    /// A fresh, idle engine. Does not read local storage.
    pub fn new(
        remote: Arc<dyn TimeStore>,
        storage: Arc<dyn LocalStorage>,
        clock: Arc<dyn Clock>,
        config: TimerConfig,
    ) -> Self {
        Self {
            remote,
            storage,
            clock,
            config,
            selection: None,
            is_running: false,
            seconds: 0,
            anchor: None,
            cache: Vec::new(),
            next_local_id: 1,
            pending: PendingQueue::default(),
            outbox: Outbox::default(),
        }
    }

    /// Rebuild the session left in local storage, extrapolating a running
    /// counter from its start timestamp. Corrupt or missing state yields an
    /// idle engine; an unreachable Time Store yields an empty history.
    pub async fn restore(
        remote: Arc<dyn TimeStore>,
        storage: Arc<dyn LocalStorage>,
        clock: Arc<dyn Clock>,
        config: TimerConfig,
    ) -> Self {
        let mut engine = Self::new(remote, storage, clock, config);

        let pending = persist::read_pending(engine.storage.as_ref());
        if !pending.is_empty() {
            info!("Restored {} unsynced timer change(s)", pending.len());
            engine.pending = PendingQueue::from_ops(pending);
            if let Some(max) = engine.pending.max_local_id() {
                engine.next_local_id = max + 1;
            }
        }

        let Some(persisted) = PersistedTimer::load(engine.storage.as_ref()) else {
            debug!("No persisted timer session");
            return engine;
        };

        let now = engine.clock.now_ms();
        engine.seconds = persisted.seconds_at(now);
        engine.selection = Some(Selection {
            task_id: persisted.task_id.clone(),
            title: None,
        });

        if let Some(anchor) = persisted.anchor {
            engine.is_running = true;
            let extrapolated = anchor.baseline + elapsed_secs(anchor.start_ms, now);
            engine.anchor = Some(if extrapolated == engine.seconds {
                anchor
            } else {
                RunAnchor {
                    start_ms: now,
                    baseline: engine.seconds,
                }
            });
            engine.persist_running();
        }

        info!(
            "Restored timer for task {} ({}, {})",
            persisted.task_id,
            if engine.is_running { "running" } else { "stopped" },
            format_duration(engine.seconds)
        );

        match engine.fetch_history(&persisted.task_id).await {
            Ok((intervals, title)) => {
                engine.rebuild_cache(&persisted.task_id, intervals);
                if let Some(selection) = engine.selection.as_mut() {
                    selection.title = title;
                }
            }
            Err(e) => warn!(
                "Could not load time history for task {}: {}",
                persisted.task_id, e
            ),
        }

        engine
    }

    // -- Queries --

    pub fn phase(&self) -> TimerPhase {
        match (&self.selection, self.is_running) {
            (None, _) => TimerPhase::Idle,
            (Some(_), false) => TimerPhase::Stopped,
            (Some(_), true) => TimerPhase::Running,
        }
    }

    pub fn selected_task_id(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.task_id.as_str())
    }

    /// Elapsed seconds including wall-clock time not yet seen as ticks.
    pub fn seconds(&self) -> u64 {
        match (self.is_running, self.anchor) {
            (true, Some(anchor)) => self
                .seconds
                .max(anchor.baseline + elapsed_secs(anchor.start_ms, self.clock.now_ms())),
            _ => self.seconds,
        }
    }

    pub fn stored_times(&self) -> Vec<u64> {
        self.cache.iter().map(|c| c.seconds).collect()
    }

    pub fn pending_ops(&self) -> usize {
        self.pending.len()
    }

    pub fn state(&self) -> TimerSnapshot {
        let seconds = self.seconds();
        let stored_times = self.stored_times();
        let total_seconds: u64 = stored_times.iter().sum();
        TimerSnapshot {
            phase: self.phase(),
            is_running: self.is_running,
            seconds,
            formatted: format_duration(seconds),
            selected_task_id: self.selection.as_ref().map(|s| s.task_id.clone()),
            selected_task_title: self.selection.as_ref().and_then(|s| s.title.clone()),
            stored_times,
            total_seconds,
            total_formatted: format_duration(total_seconds),
            pending_ops: self.pending.len(),
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.outbox.drain()
    }

    // -- Commands --

    /// Attach the session to `task_id` in the stopped state, replacing the
    /// cached history. On fetch failure nothing changes.
    pub async fn select_task(&mut self, task_id: &str) -> Result<(), TrackError> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Ok(());
        }

        let (intervals, title) = self.fetch_history(task_id).await?;
        self.resync();

        let same_task = self.selected_task_id() == Some(task_id);
        if same_task {
            self.is_running = false;
            self.anchor = None;
        } else {
            if let Some(previous) = self.selection.take() {
                if self.seconds > 0 {
                    self.persist_result(persist::write_stash(
                        self.storage.as_ref(),
                        &previous.task_id,
                        self.seconds,
                    ));
                    debug!(
                        "Stashed {}s unsaved on task {}",
                        self.seconds, previous.task_id
                    );
                }
            }
            self.is_running = false;
            self.anchor = None;
            self.seconds = match persist::take_stash(self.storage.as_ref(), task_id) {
                Ok(stashed) => stashed.unwrap_or(0),
                Err(e) => {
                    warn!("Failed to read stashed time for task {}: {}", task_id, e);
                    0
                }
            };
        }

        self.selection = Some(Selection {
            task_id: task_id.to_string(),
            title,
        });
        self.rebuild_cache(task_id, intervals);
        self.persist_stopped();

        info!("Selected task {} for timing", task_id);
        Ok(())
    }

    pub fn start(&mut self) {
        if self.is_running || self.selection.is_none() {
            return;
        }
        self.is_running = true;
        self.anchor = Some(RunAnchor {
            start_ms: self.clock.now_ms(),
            baseline: self.seconds,
        });
        self.persist_running();
        debug!("Timer started at {}", format_duration(self.seconds));
    }

    pub fn pause(&mut self) {
        if !self.is_running || self.selection.is_none() {
            return;
        }
        self.resync();
        self.is_running = false;
        self.anchor = None;
        self.persist_stopped();
        debug!("Timer paused at {}", format_duration(self.seconds));
    }

    pub fn toggle(&mut self) {
        if self.is_running {
            self.pause();
        } else {
            self.start();
        }
    }

    /// Driven by the tick loop. Advances the counter to the whole seconds
    /// elapsed on the wall clock since the run started, so a tick landing
    /// inside a sub-second run adds nothing.
    pub fn tick(&mut self) {
        if !self.is_running || self.selection.is_none() {
            return;
        }
        self.catch_up();
    }

    /// Catch the counter up with the wall clock (missed ticks, suspended host).
    pub fn resync(&mut self) {
        let before = self.seconds;
        if self.catch_up() {
            debug!("Resynced timer: {}s -> {}s", before, self.seconds);
        }
    }

    /// Record the current interval and restart the counter from zero.
    /// Running timers keep running. Returns the saved duration.
    pub async fn save(&mut self) -> Option<u64> {
        let selection = self.selection.clone()?;
        self.resync();

        let seconds = self.seconds;
        let local_id = self.next_local_id();
        self.cache.push(CachedInterval {
            local_id,
            remote_id: None,
            seconds,
        });
        self.enqueue(PendingOp::append(local_id, &selection.task_id, seconds));

        self.seconds = 0;
        if self.is_running {
            self.anchor = Some(RunAnchor {
                start_ms: self.clock.now_ms(),
                baseline: 0,
            });
            self.persist_running();
        } else {
            self.persist_stopped();
        }

        self.outbox.push(Notification::Saved {
            task_id: selection.task_id,
            task_title: selection.title,
            seconds,
            formatted: format_duration(seconds),
        });

        self.flush_if_alone().await;
        Some(seconds)
    }

    /// Stop and zero the counter, discarding unsaved time. History is untouched.
    pub fn reset(&mut self) {
        let Some(task_id) = self.selected_task_id().map(str::to_string) else {
            return;
        };
        self.is_running = false;
        self.anchor = None;
        self.seconds = 0;
        self.persist_result(persist::clear_counter(self.storage.as_ref(), &task_id));
        debug!("Timer reset for task {}", task_id);
    }

    /// Remove the recorded interval at `index`. Returns its duration.
    pub async fn delete_record(&mut self, index: usize) -> Option<u64> {
        let task_id = self.selected_task_id()?.to_string();
        if index >= self.cache.len() {
            debug!(
                "Ignoring delete of record {} (only {} recorded)",
                index,
                self.cache.len()
            );
            return None;
        }

        let entry = self.cache.remove(index);
        if self.pending.cancel_append(entry.local_id) {
            self.persist_pending();
            debug!("Deleted record {} before its save reached the store", index);
            return Some(entry.seconds);
        }

        match entry.remote_id {
            Some(interval_id) => {
                self.enqueue(PendingOp::remove(
                    entry.local_id,
                    &task_id,
                    entry.seconds,
                    interval_id,
                    index,
                ));
                self.flush_if_alone().await;
            }
            None => warn!(
                "Record {} of task {} has no remote id and no pending save",
                index, task_id
            ),
        }
        Some(entry.seconds)
    }

    /// Detach from the task. Unsaved seconds are stashed for a later `select_task`.
    pub fn clear_selection(&mut self) {
        self.resync();
        let Some(selection) = self.selection.take() else {
            return;
        };
        self.persist_result(persist::clear_selection(
            self.storage.as_ref(),
            &selection.task_id,
            self.seconds,
        ));
        self.is_running = false;
        self.anchor = None;
        self.seconds = 0;
        self.cache.clear();
        debug!("Cleared timer selection (was task {})", selection.task_id);
    }

    /// Replay queued remote mutations once.
    pub async fn reconcile(&mut self) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        if self.pending.is_empty() {
            return summary;
        }

        let remote = Arc::clone(&self.remote);
        let timeout = self.config.remote_timeout();
        let max_attempts = self.config.max_sync_attempts.max(1);

        for mut op in self.pending.take_all() {
            match reconcile::execute(remote.as_ref(), &op, timeout).await {
                Ok(remote_id) => {
                    summary.confirmed += 1;
                    if let Some(remote_id) = remote_id {
                        self.confirm_append(&op, remote_id);
                    }
                }
                Err(e) => {
                    op.attempts += 1;
                    let will_retry = e.is_retriable() && op.attempts < max_attempts;
                    self.outbox.push(Notification::SyncFailed {
                        task_id: op.task_id.clone(),
                        operation: op.operation(),
                        error: e.to_string(),
                        will_retry,
                    });
                    if will_retry {
                        summary.retrying += 1;
                        self.pending.push(op);
                    } else {
                        summary.reverted += 1;
                        self.revert(op);
                    }
                }
            }
        }

        self.persist_pending();

        if summary.retrying > 0 || summary.reverted > 0 {
            warn!(
                "Reconciliation: {} confirmed, {} retrying, {} reverted",
                summary.confirmed, summary.retrying, summary.reverted
            );
        }
        summary
    }

    // -- Internals --

    /// Fold wall-clock elapsed time into the counter. True if it moved.
    fn catch_up(&mut self) -> bool {
        let current = self.seconds();
        if current <= self.seconds {
            return false;
        }
        self.seconds = current;
        self.persist_result(persist::write_tick(self.storage.as_ref(), self.seconds));
        true
    }

    /// Queue a remote mutation and record it locally before any attempt.
    fn enqueue(&mut self, op: PendingOp) {
        self.pending.push(op);
        self.persist_pending();
    }

    /// First attempt for a freshly queued op. Behind a backlog it waits for
    /// the periodic pass, which keeps FIFO order and spends one attempt per
    /// op per pass.
    async fn flush_if_alone(&mut self) {
        let backlog = self.pending.len();
        if backlog > 1 {
            debug!("Queued timer change behind {} unsynced one(s)", backlog - 1);
            return;
        }
        self.reconcile().await;
    }

    fn persist_pending(&self) {
        self.persist_result(persist::write_pending(
            self.storage.as_ref(),
            self.pending.iter(),
        ));
    }

    async fn fetch_history(
        &self,
        task_id: &str,
    ) -> Result<(Vec<Interval>, Option<String>), TrackError> {
        let timeout = self.config.remote_timeout();
        let intervals = with_timeout(
            "fetch_intervals",
            timeout,
            self.remote.fetch_intervals(task_id),
        )
        .await?;
        let title = match with_timeout("task_title", timeout, self.remote.task_title(task_id)).await
        {
            Ok(title) => title,
            Err(e) => {
                debug!("No title for task {}: {}", task_id, e);
                None
            }
        };
        Ok((intervals, title))
    }

    /// Replace the cache with remote history, overlaid with this task's
    /// still-pending saves and deletes.
    fn rebuild_cache(&mut self, task_id: &str, intervals: Vec<Interval>) {
        let removing: Vec<String> = self
            .pending
            .iter_for_task(task_id)
            .filter_map(|op| match &op.kind {
                PendingKind::Remove { interval_id, .. } => Some(interval_id.clone()),
                PendingKind::Append => None,
            })
            .collect();
        let appending: Vec<(u64, u64)> = self
            .pending
            .iter_for_task(task_id)
            .filter(|op| op.kind == PendingKind::Append)
            .map(|op| (op.local_id, op.seconds))
            .collect();

        let mut cache = Vec::with_capacity(intervals.len() + appending.len());
        for interval in intervals {
            if removing.contains(&interval.id) {
                continue;
            }
            cache.push(CachedInterval {
                local_id: self.next_local_id(),
                remote_id: Some(interval.id),
                seconds: interval.seconds,
            });
        }
        for (local_id, seconds) in appending {
            cache.push(CachedInterval {
                local_id,
                remote_id: None,
                seconds,
            });
        }
        self.cache = cache;
    }

    fn confirm_append(&mut self, op: &PendingOp, remote_id: String) {
        if self.selected_task_id() != Some(op.task_id.as_str()) {
            return;
        }
        if let Some(entry) = self.cache.iter_mut().find(|c| c.local_id == op.local_id) {
            entry.remote_id = Some(remote_id);
        }
    }

    /// Undo the optimistic local mutation of a permanently failed op.
    fn revert(&mut self, op: PendingOp) {
        let operation = op.operation();
        if self.selected_task_id() == Some(op.task_id.as_str()) {
            match op.kind {
                PendingKind::Append => {
                    self.cache.retain(|c| c.local_id != op.local_id);
                }
                PendingKind::Remove {
                    interval_id,
                    position,
                } => {
                    let at = position.min(self.cache.len());
                    self.cache.insert(
                        at,
                        CachedInterval {
                            local_id: op.local_id,
                            remote_id: Some(interval_id),
                            seconds: op.seconds,
                        },
                    );
                }
            }
        }
        self.outbox.push(Notification::Reverted {
            task_id: op.task_id,
            operation,
            seconds: op.seconds,
        });
    }

    fn next_local_id(&mut self) -> u64 {
        let id = self.next_local_id;
        self.next_local_id += 1;
        id
    }

    fn persist_running(&self) {
        if let (Some(task_id), Some(anchor)) = (self.selected_task_id(), self.anchor) {
            self.persist_result(persist::write_running(
                self.storage.as_ref(),
                task_id,
                anchor,
                self.seconds,
            ));
        }
    }

    fn persist_stopped(&self) {
        if let Some(task_id) = self.selected_task_id() {
            self.persist_result(persist::write_stopped(
                self.storage.as_ref(),
                task_id,
                self.seconds,
            ));
        }
    }

    /// Local storage failures are logged, never surfaced to commands.
    fn persist_result(&self, result: anyhow::Result<()>) {
        if let Err(e) = result {
            warn!("Failed to persist timer state: {}", e);
        }
    }
}
