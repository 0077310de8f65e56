// src/timer/service.rs — Single-owner event loop around the TimerEngine
//
// Commands, the 1 s tick and the periodic reconciliation pass are
// serialized through one `tokio::select!` loop, so the engine never needs
// a lock. Callers hold a cloneable `TimerHandle`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use super::engine::{TimerEngine, TimerSnapshot};
use super::notify::Notification;
use crate::infra::config::TimerConfig;
use crate::infra::errors::TrackError;

/// A state-changing timer command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    Select(String),
    Start,
    Pause,
    Toggle,
    Save,
    Reset,
    Delete(usize),
    ClearSelection,
    Reconcile,
}

/// Snapshot after a command plus whatever notifications it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub state: TimerSnapshot,
    pub notifications: Vec<Notification>,
}

/// Run one action against the engine.
pub async fn apply(engine: &mut TimerEngine, action: TimerAction) -> Result<(), TrackError> {
    match action {
        TimerAction::Select(task_id) => engine.select_task(&task_id).await?,
        TimerAction::Start => engine.start(),
        TimerAction::Pause => engine.pause(),
        TimerAction::Toggle => engine.toggle(),
        TimerAction::Save => {
            engine.save().await;
        }
        TimerAction::Reset => engine.reset(),
        TimerAction::Delete(index) => {
            engine.delete_record(index).await;
        }
        TimerAction::ClearSelection => engine.clear_selection(),
        TimerAction::Reconcile => {
            engine.reconcile().await;
        }
    }
    Ok(())
}

#[derive(Debug)]
pub enum TimerCommand {
    Apply {
        action: TimerAction,
        resp: oneshot::Sender<Result<CommandReply, TrackError>>,
    },
    State {
        resp: oneshot::Sender<TimerSnapshot>,
    },
    Notifications {
        resp: oneshot::Sender<Vec<Notification>>,
    },
}

#[derive(Clone)]
pub struct TimerHandle {
    tx: mpsc::Sender<TimerCommand>,
}

impl TimerHandle {
    pub fn new(tx: mpsc::Sender<TimerCommand>) -> Self {
        Self { tx }
    }

    pub async fn apply(&self, action: TimerAction) -> Result<CommandReply, TrackError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(TimerCommand::Apply {
                action,
                resp: resp_tx,
            })
            .await
            .map_err(|_| TrackError::ServiceStopped)?;
        resp_rx.await.map_err(|_| TrackError::ServiceStopped)?
    }

    pub async fn state(&self) -> Result<TimerSnapshot, TrackError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(TimerCommand::State { resp: resp_tx })
            .await
            .map_err(|_| TrackError::ServiceStopped)?;
        resp_rx.await.map_err(|_| TrackError::ServiceStopped)
    }

    pub async fn drain_notifications(&self) -> Result<Vec<Notification>, TrackError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(TimerCommand::Notifications { resp: resp_tx })
            .await
            .map_err(|_| TrackError::ServiceStopped)?;
        resp_rx.await.map_err(|_| TrackError::ServiceStopped)
    }
}

/// Spawn the timer service. It stops once every handle is dropped.
pub fn spawn_timer_server(
    engine: TimerEngine,
    config: &TimerConfig,
) -> (TimerHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);
    let handle = TimerHandle::new(tx);
    let join_handle = tokio::spawn(run_timer_server(
        engine,
        rx,
        config.tick_interval(),
        config.reconcile_interval(),
    ));
    (handle, join_handle)
}

pub async fn run_timer_server(
    mut engine: TimerEngine,
    mut rx: mpsc::Receiver<TimerCommand>,
    tick_every: Duration,
    reconcile_every: Duration,
) {
    let mut ticker = tokio::time::interval(tick_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Consume the immediate first tick
    ticker.tick().await;

    let mut reconcile_interval = tokio::time::interval(reconcile_every);
    reconcile_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    reconcile_interval.tick().await;

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                let Some(cmd) = cmd else { break };
                handle_command(&mut engine, cmd).await;
            }
            _ = ticker.tick() => engine.tick(),
            _ = reconcile_interval.tick() => {
                if engine.pending_ops() > 0 {
                    engine.reconcile().await;
                }
            }
        }
    }

    if engine.pending_ops() > 0 {
        tracing::warn!(
            "Timer service stopping with {} unsynced operation(s); kept for the next start",
            engine.pending_ops()
        );
    }
    tracing::debug!("Timer server stopped: all handles dropped");
}

async fn handle_command(engine: &mut TimerEngine, cmd: TimerCommand) {
    match cmd {
        TimerCommand::Apply { action, resp } => {
            tracing::debug!("Timer command: {:?}", action);
            let result = apply(engine, action).await.map(|()| {
                engine.resync();
                CommandReply {
                    state: engine.state(),
                    notifications: engine.drain_notifications(),
                }
            });
            let _ = resp.send(result);
        }
        TimerCommand::State { resp } => {
            engine.resync();
            let _ = resp.send(engine.state());
        }
        TimerCommand::Notifications { resp } => {
            let _ = resp.send(engine.drain_notifications());
        }
    }
}
