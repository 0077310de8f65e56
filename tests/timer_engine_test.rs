// tests/timer_engine_test.rs — Integration test: timer engine over the SQLite store

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tasktrack::infra::config::TimerConfig;
use tasktrack::infra::errors::TrackError;
use tasktrack::store::types::Interval;
use tasktrack::store::{spawn_store_server, Store, StoreHandle};
use tasktrack::timer::notify::SyncOperation;
use tasktrack::timer::{
    FileStorage, ManualClock, MemoryStorage, Notification, TimeStore, TimerEngine, TimerPhase,
};
use tempfile::TempDir;

const T0: i64 = 1_760_000_000_000;

/// A store with task "T1" whose history is `[60, 120]`.
fn seeded_store() -> (StoreHandle, String) {
    let store = Store::open_in_memory().unwrap();
    let user = store.insert_user("Ada", "Lovelace", "ada@example.com").unwrap();
    let project = store.insert_project(&user.id, "Analytical Engine").unwrap();
    let task = store
        .insert_task(&project.id, "T1", None, None, None)
        .unwrap();
    store.append_interval(&task.id, 60).unwrap();
    store.append_interval(&task.id, 120).unwrap();
    let (handle, _) = spawn_store_server(store);
    (handle, task.id)
}

/// Passes through to the store unless switched offline.
struct Flaky {
    inner: StoreHandle,
    offline: AtomicBool,
}

impl Flaky {
    fn check(&self) -> Result<(), TrackError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(TrackError::Store("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TimeStore for Flaky {
    async fn fetch_intervals(&self, task_id: &str) -> Result<Vec<Interval>, TrackError> {
        self.check()?;
        TimeStore::fetch_intervals(&self.inner, task_id).await
    }

    async fn append_interval(&self, task_id: &str, seconds: u64) -> Result<Interval, TrackError> {
        self.check()?;
        TimeStore::append_interval(&self.inner, task_id, seconds).await
    }

    async fn remove_interval(&self, task_id: &str, interval_id: &str) -> Result<bool, TrackError> {
        self.check()?;
        TimeStore::remove_interval(&self.inner, task_id, interval_id).await
    }
}

async fn stored_seconds(store: &StoreHandle, task_id: &str) -> Vec<u64> {
    store
        .fetch_intervals(task_id)
        .await
        .unwrap()
        .iter()
        .map(|i| i.seconds)
        .collect()
}

#[tokio::test]
async fn test_select_start_tick_save_scenario() {
    let (store, task_id) = seeded_store();
    let clock = ManualClock::new(T0);
    let mut engine = TimerEngine::new(
        Arc::new(store.clone()),
        Arc::new(MemoryStorage::new()),
        Arc::new(clock.clone()),
        TimerConfig::default(),
    );

    engine.select_task(&task_id).await.unwrap();
    assert_eq!(engine.state().stored_times, vec![60, 120]);

    engine.start();
    for _ in 0..10 {
        clock.advance_secs(1);
        engine.tick();
    }
    assert_eq!(engine.state().seconds, 10);

    assert_eq!(engine.save().await, Some(10));
    let state = engine.state();
    assert_eq!(state.stored_times, vec![60, 120, 10]);
    assert_eq!(state.seconds, 0);
    assert_eq!(state.total_formatted, "00:03:10");
    assert_eq!(stored_seconds(&store, &task_id).await, vec![60, 120, 10]);
}

#[tokio::test]
async fn test_running_timer_survives_restart() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state").join("timer-state.json");
    let (store, task_id) = seeded_store();
    let clock = ManualClock::new(T0);

    {
        let mut engine = TimerEngine::new(
            Arc::new(store.clone()),
            Arc::new(FileStorage::open(&state_path)),
            Arc::new(clock.clone()),
            TimerConfig::default(),
        );
        engine.select_task(&task_id).await.unwrap();
        engine.start();
        for _ in 0..40 {
            clock.advance_secs(1);
            engine.tick();
        }
    }

    // Process gone for two minutes and five seconds
    clock.advance_secs(125);
    let engine = TimerEngine::restore(
        Arc::new(store.clone()),
        Arc::new(FileStorage::open(&state_path)),
        Arc::new(clock.clone()),
        TimerConfig::default(),
    )
    .await;

    let state = engine.state();
    assert_eq!(state.phase, TimerPhase::Running);
    assert_eq!(state.seconds, 165);
    assert_eq!(state.selected_task_id.as_deref(), Some(task_id.as_str()));
    assert_eq!(state.stored_times, vec![60, 120]);
}

#[tokio::test]
async fn test_corrupt_state_file_restores_idle() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("timer-state.json");
    std::fs::write(&state_path, "][").unwrap();
    let (store, _) = seeded_store();

    let engine = TimerEngine::restore(
        Arc::new(store),
        Arc::new(FileStorage::open(&state_path)),
        Arc::new(ManualClock::new(T0)),
        TimerConfig::default(),
    )
    .await;
    assert_eq!(engine.state().phase, TimerPhase::Idle);
}

#[tokio::test]
async fn test_offline_save_syncs_once_store_returns() {
    let (store, task_id) = seeded_store();
    let flaky = Arc::new(Flaky {
        inner: store.clone(),
        offline: AtomicBool::new(false),
    });
    let clock = ManualClock::new(T0);
    let mut engine = TimerEngine::new(
        flaky.clone(),
        Arc::new(MemoryStorage::new()),
        Arc::new(clock.clone()),
        TimerConfig::default(),
    );

    engine.select_task(&task_id).await.unwrap();
    engine.start();
    clock.advance_secs(30);
    flaky.offline.store(true, Ordering::SeqCst);

    engine.save().await;
    assert_eq!(engine.state().stored_times, vec![60, 120, 30]);
    assert_eq!(engine.pending_ops(), 1);
    let notes = engine.drain_notifications();
    assert!(notes.iter().any(|n| matches!(
        n,
        Notification::SyncFailed {
            operation: SyncOperation::Save,
            will_retry: true,
            ..
        }
    )));

    flaky.offline.store(false, Ordering::SeqCst);
    let summary = engine.reconcile().await;
    assert_eq!(summary.confirmed, 1);
    assert_eq!(stored_seconds(&store, &task_id).await, vec![60, 120, 30]);

    // The confirmed entry can now be deleted remotely by id
    engine.delete_record(2).await;
    assert_eq!(stored_seconds(&store, &task_id).await, vec![60, 120]);
}

#[tokio::test]
async fn test_offline_delete_is_reverted() {
    let (store, task_id) = seeded_store();
    let flaky = Arc::new(Flaky {
        inner: store.clone(),
        offline: AtomicBool::new(false),
    });
    let mut engine = TimerEngine::new(
        flaky.clone(),
        Arc::new(MemoryStorage::new()),
        Arc::new(ManualClock::new(T0)),
        TimerConfig {
            max_sync_attempts: 1,
            ..TimerConfig::default()
        },
    );

    engine.select_task(&task_id).await.unwrap();
    flaky.offline.store(true, Ordering::SeqCst);
    engine.delete_record(0).await;

    assert_eq!(engine.state().stored_times, vec![60, 120]);
    assert_eq!(engine.pending_ops(), 0);
    assert!(engine
        .drain_notifications()
        .iter()
        .any(|n| matches!(n, Notification::Reverted { operation: SyncOperation::Delete, .. })));
    assert_eq!(stored_seconds(&store, &task_id).await, vec![60, 120]);
}

#[tokio::test]
async fn test_offline_save_survives_process_restart() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("timer-state.json");
    let (store, task_id) = seeded_store();
    let flaky = Arc::new(Flaky {
        inner: store.clone(),
        offline: AtomicBool::new(true),
    });
    let clock = ManualClock::new(T0);

    {
        let mut engine = TimerEngine::new(
            Arc::new(store.clone()),
            Arc::new(FileStorage::open(&state_path)),
            Arc::new(clock.clone()),
            TimerConfig::default(),
        );
        engine.select_task(&task_id).await.unwrap();
    }
    {
        let mut engine = TimerEngine::restore(
            flaky.clone(),
            Arc::new(FileStorage::open(&state_path)),
            Arc::new(clock.clone()),
            TimerConfig::default(),
        )
        .await;
        engine.start();
        clock.advance_secs(600);
        engine.pause();
        assert_eq!(engine.save().await, Some(600));
        assert_eq!(engine.pending_ops(), 1);
    }

    // Next invocation, store reachable again
    flaky.offline.store(false, Ordering::SeqCst);
    let mut engine = TimerEngine::restore(
        flaky.clone(),
        Arc::new(FileStorage::open(&state_path)),
        Arc::new(clock.clone()),
        TimerConfig::default(),
    )
    .await;
    let state = engine.state();
    assert_eq!(state.seconds, 0);
    assert_eq!(state.stored_times, vec![60, 120, 600]);
    assert_eq!(state.pending_ops, 1);

    assert_eq!(engine.reconcile().await.confirmed, 1);
    assert_eq!(stored_seconds(&store, &task_id).await, vec![60, 120, 600]);

    let raw = std::fs::read_to_string(&state_path).unwrap();
    assert!(!raw.contains("timerPending"));
}
