// src/cli/timer.rs — One-shot timer commands
//
// Each invocation rebuilds the engine from the local state file, applies
// one action, and prints the result. A running timer keeps "running"
// between invocations through its persisted start timestamp, and unsynced
// saves or deletes wait in the same file.

use std::sync::Arc;

use super::{open_store, TimerCmd};
use crate::infra::config::Config;
use crate::infra::paths;
use crate::store::spawn_store_server;
use crate::timer::format::format_duration;
use crate::timer::service::{apply, TimerAction};
use crate::timer::{FileStorage, Notification, SystemClock, TimerEngine, TimerPhase, TimerSnapshot};

pub async fn run_timer(action: TimerCmd, config: &Config) -> anyhow::Result<()> {
    paths::ensure_dirs().await?;
    let store = open_store()?;
    let (store_handle, _store_join) = spawn_store_server(store);
    let storage = FileStorage::open(&paths::timer_state_path());

    let mut engine = TimerEngine::restore(
        Arc::new(store_handle),
        Arc::new(storage),
        Arc::new(SystemClock),
        config.timer.clone(),
    )
    .await;

    // Changes left unsynced by an earlier invocation get one attempt per run
    if engine.pending_ops() > 0 {
        engine.reconcile().await;
    }
    if let Some(action) = to_action(action) {
        apply(&mut engine, action).await?;
    }
    if engine.pending_ops() > 0 {
        tracing::warn!(
            "{} timer change(s) not yet synced; retrying on the next timer command",
            engine.pending_ops()
        );
    }

    print_notifications(&engine.drain_notifications());
    print_snapshot(&engine.state());
    Ok(())
}

fn to_action(cmd: TimerCmd) -> Option<TimerAction> {
    Some(match cmd {
        TimerCmd::Status => return None,
        TimerCmd::Select { task_id } => TimerAction::Select(task_id),
        TimerCmd::Start => TimerAction::Start,
        TimerCmd::Pause => TimerAction::Pause,
        TimerCmd::Toggle => TimerAction::Toggle,
        TimerCmd::Save => TimerAction::Save,
        TimerCmd::Reset => TimerAction::Reset,
        TimerCmd::Delete { index } => TimerAction::Delete(index),
        TimerCmd::Clear => TimerAction::ClearSelection,
    })
}

fn print_notifications(notifications: &[Notification]) {
    for n in notifications {
        if n.is_error() {
            eprintln!("! {}", n.message());
        } else {
            println!("{}", n.message());
        }
    }
}

fn print_snapshot(state: &TimerSnapshot) {
    let Some(ref task_id) = state.selected_task_id else {
        println!("No task selected. Run `tasktrack timer select <task-id>`.");
        return;
    };

    let label = state.selected_task_title.as_deref().unwrap_or(task_id);
    let phase = match state.phase {
        TimerPhase::Running => "running",
        TimerPhase::Stopped => "stopped",
        TimerPhase::Idle => "idle",
    };
    println!("  Task:    {label} ({task_id})");
    println!("  Timer:   {} [{phase}]", state.formatted);

    if state.stored_times.is_empty() {
        println!("  Records: (none)");
    } else {
        println!("  Records:");
        for (i, seconds) in state.stored_times.iter().enumerate() {
            println!("    [{i}] {}", format_duration(*seconds));
        }
        println!("  Total:   {}", state.total_formatted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_no_action() {
        assert!(to_action(TimerCmd::Status).is_none());
        assert_eq!(to_action(TimerCmd::Clear), Some(TimerAction::ClearSelection));
        assert_eq!(
            to_action(TimerCmd::Select {
                task_id: "t1".into()
            }),
            Some(TimerAction::Select("t1".into()))
        );
    }
}
