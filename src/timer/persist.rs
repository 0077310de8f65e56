// src/timer/persist.rs — Resumable timer state in local storage
//
// While running, the authoritative record is (start timestamp, baseline):
// elapsed = baseline + floor((now - start) / 1000). `timerSeconds` mirrors
// the live counter on every tick and acts as a floor, so a clock that
// jumped backwards never shrinks the count.

use super::clock::elapsed_secs;
use super::local::LocalStorage;
use super::reconcile::PendingOp;

pub const SELECTED_TASK_KEY: &str = "selectedTaskId";
pub const IS_RUNNING_KEY: &str = "timerIsRunning";
pub const BASELINE_KEY: &str = "timerBaseline";
pub const START_TIME_KEY: &str = "timerStartTime";
pub const SECONDS_KEY: &str = "timerSeconds";
/// Remote mutations not yet confirmed by the Time Store, as a JSON array.
pub const PENDING_KEY: &str = "timerPending";
const STASH_PREFIX: &str = "timerStash:";

/// Key holding unsaved seconds for a task the user switched away from.
pub fn stash_key(task_id: &str) -> String {
    format!("{STASH_PREFIX}{task_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunAnchor {
    pub start_ms: i64,
    pub baseline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTimer {
    pub task_id: String,
    pub anchor: Option<RunAnchor>,
    pub seconds: u64,
}

impl PersistedTimer {
    /// Read the persisted session. `None` means no task was selected.
    /// Corrupt counter entries degrade to a stopped timer at zero.
    pub fn load(storage: &dyn LocalStorage) -> Option<Self> {
        let task_id = storage
            .get(SELECTED_TASK_KEY)
            .map(|raw| normalize_task_id(&raw))
            .filter(|id| !id.is_empty())?;

        let seconds = parse_u64(storage.get(SECONDS_KEY));
        let running = storage.get(IS_RUNNING_KEY).as_deref().map(str::trim) == Some("true");

        let anchor = if running {
            let start = storage
                .get(START_TIME_KEY)
                .and_then(|s| s.trim().parse::<i64>().ok());
            let baseline = storage
                .get(BASELINE_KEY)
                .and_then(|s| s.trim().parse::<u64>().ok());
            match (start, baseline) {
                (Some(start_ms), Some(baseline)) => Some(RunAnchor { start_ms, baseline }),
                _ => {
                    tracing::warn!("Persisted timer marked running without a valid anchor; restoring stopped");
                    None
                }
            }
        } else {
            None
        };

        Some(Self {
            task_id,
            anchor,
            seconds: seconds.unwrap_or(0),
        })
    }

    /// Elapsed seconds as of `now_ms`.
    pub fn seconds_at(&self, now_ms: i64) -> u64 {
        match self.anchor {
            Some(anchor) => {
                let extrapolated = anchor.baseline + elapsed_secs(anchor.start_ms, now_ms);
                extrapolated.max(self.seconds)
            }
            None => self.seconds,
        }
    }
}

/// Older writers stored the id JSON-encoded (`"\"abc\""`).
fn normalize_task_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match serde_json::from_str::<String>(trimmed) {
        Ok(decoded) => decoded.trim().to_string(),
        Err(_) => trimmed.to_string(),
    }
}

fn parse_u64(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
}

pub fn read_stash(storage: &dyn LocalStorage, task_id: &str) -> Option<u64> {
    parse_u64(storage.get(&stash_key(task_id)))
}

pub fn write_running(
    storage: &dyn LocalStorage,
    task_id: &str,
    anchor: RunAnchor,
    seconds: u64,
) -> anyhow::Result<()> {
    storage.write_batch(&[
        (SELECTED_TASK_KEY, Some(task_id.to_string())),
        (IS_RUNNING_KEY, Some("true".into())),
        (BASELINE_KEY, Some(anchor.baseline.to_string())),
        (START_TIME_KEY, Some(anchor.start_ms.to_string())),
        (SECONDS_KEY, Some(seconds.to_string())),
    ])
}

pub fn write_stopped(storage: &dyn LocalStorage, task_id: &str, seconds: u64) -> anyhow::Result<()> {
    storage.write_batch(&[
        (SELECTED_TASK_KEY, Some(task_id.to_string())),
        (IS_RUNNING_KEY, Some("false".into())),
        (BASELINE_KEY, Some(seconds.to_string())),
        (START_TIME_KEY, None),
        (SECONDS_KEY, Some(seconds.to_string())),
    ])
}

pub fn write_tick(storage: &dyn LocalStorage, seconds: u64) -> anyhow::Result<()> {
    storage.set(SECONDS_KEY, seconds.to_string())
}

/// Drop the in-flight counter for `task_id` but keep it selected.
pub fn clear_counter(storage: &dyn LocalStorage, task_id: &str) -> anyhow::Result<()> {
    let stash = stash_key(task_id);
    storage.write_batch(&[
        (SELECTED_TASK_KEY, Some(task_id.to_string())),
        (IS_RUNNING_KEY, Some("false".into())),
        (BASELINE_KEY, None),
        (START_TIME_KEY, None),
        (SECONDS_KEY, None),
        (stash.as_str(), None),
    ])
}

/// Forget the selection. Unsaved seconds (if any) move to the task's stash.
pub fn clear_selection(
    storage: &dyn LocalStorage,
    task_id: &str,
    unsaved: u64,
) -> anyhow::Result<()> {
    let stash = stash_key(task_id);
    let stash_value = (unsaved > 0).then(|| unsaved.to_string());
    storage.write_batch(&[
        (SELECTED_TASK_KEY, None),
        (IS_RUNNING_KEY, None),
        (BASELINE_KEY, None),
        (START_TIME_KEY, None),
        (SECONDS_KEY, None),
        (stash.as_str(), stash_value),
    ])
}

pub fn write_stash(storage: &dyn LocalStorage, task_id: &str, seconds: u64) -> anyhow::Result<()> {
    storage.set(&stash_key(task_id), seconds.to_string())
}

/// Unsynced ops left by an earlier session. Corrupt entries read as none.
pub fn read_pending(storage: &dyn LocalStorage) -> Vec<PendingOp> {
    let Some(raw) = storage.get(PENDING_KEY) else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(ops) => ops,
        Err(e) => {
            tracing::warn!("Discarding unreadable pending timer changes: {}", e);
            Vec::new()
        }
    }
}

pub fn write_pending<'a>(
    storage: &dyn LocalStorage,
    ops: impl Iterator<Item = &'a PendingOp>,
) -> anyhow::Result<()> {
    let ops: Vec<&PendingOp> = ops.collect();
    if ops.is_empty() {
        return storage.remove(PENDING_KEY);
    }
    storage.set(PENDING_KEY, serde_json::to_string(&ops)?)
}

/// Consume a stash entry once it has been restored.
pub fn take_stash(storage: &dyn LocalStorage, task_id: &str) -> anyhow::Result<Option<u64>> {
    let value = read_stash(storage, task_id);
    if value.is_some() {
        storage.remove(&stash_key(task_id))?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::local::MemoryStorage;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_empty_storage_is_idle() {
        let storage = MemoryStorage::new();
        assert!(PersistedTimer::load(&storage).is_none());
    }

    #[test]
    fn test_running_extrapolates_from_anchor() {
        let storage = MemoryStorage::new();
        write_running(
            &storage,
            "t1",
            RunAnchor {
                start_ms: T0,
                baseline: 40,
            },
            40,
        )
        .unwrap();

        let persisted = PersistedTimer::load(&storage).unwrap();
        assert_eq!(persisted.task_id, "t1");
        assert_eq!(persisted.seconds_at(T0 + 125_000), 165);
    }

    #[test]
    fn test_clock_skew_never_moves_backwards() {
        let storage = MemoryStorage::new();
        write_running(
            &storage,
            "t1",
            RunAnchor {
                start_ms: T0,
                baseline: 10,
            },
            10,
        )
        .unwrap();
        write_tick(&storage, 70).unwrap();

        let persisted = PersistedTimer::load(&storage).unwrap();
        assert_eq!(persisted.seconds_at(T0 - 3_600_000), 70);
    }

    #[test]
    fn test_running_without_anchor_degrades_to_stopped() {
        let storage = MemoryStorage::new();
        storage
            .write_batch(&[
                (SELECTED_TASK_KEY, Some("t1".into())),
                (IS_RUNNING_KEY, Some("true".into())),
                (START_TIME_KEY, Some("yesterday".into())),
                (SECONDS_KEY, Some("33".into())),
            ])
            .unwrap();

        let persisted = PersistedTimer::load(&storage).unwrap();
        assert!(persisted.anchor.is_none());
        assert_eq!(persisted.seconds_at(T0), 33);
    }

    #[test]
    fn test_corrupt_seconds_read_as_zero() {
        let storage = MemoryStorage::new();
        storage
            .write_batch(&[
                (SELECTED_TASK_KEY, Some("t1".into())),
                (SECONDS_KEY, Some("NaN".into())),
            ])
            .unwrap();
        assert_eq!(PersistedTimer::load(&storage).unwrap().seconds, 0);
    }

    #[test]
    fn test_json_encoded_task_id_accepted() {
        let storage = MemoryStorage::new();
        storage
            .set(SELECTED_TASK_KEY, "\"abc123\"".into())
            .unwrap();
        assert_eq!(PersistedTimer::load(&storage).unwrap().task_id, "abc123");
    }

    #[test]
    fn test_pending_ops_kept_until_emptied() {
        let storage = MemoryStorage::new();
        let ops = [PendingOp::append(1, "t1", 600)];
        write_pending(&storage, ops.iter()).unwrap();
        assert_eq!(read_pending(&storage), ops.to_vec());

        write_pending(&storage, std::iter::empty()).unwrap();
        assert!(storage.get(PENDING_KEY).is_none());

        storage.set(PENDING_KEY, "{not json".into()).unwrap();
        assert!(read_pending(&storage).is_empty());
    }

    #[test]
    fn test_clear_selection_stashes_unsaved() {
        let storage = MemoryStorage::new();
        write_stopped(&storage, "t1", 25).unwrap();
        clear_selection(&storage, "t1", 25).unwrap();

        assert!(PersistedTimer::load(&storage).is_none());
        assert_eq!(take_stash(&storage, "t1").unwrap(), Some(25));
        assert_eq!(take_stash(&storage, "t1").unwrap(), None);
    }
}
