// src/timer/remote.rs — Time Store contract consumed by the engine

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::infra::errors::TrackError;
use crate::store::types::Interval;
use crate::store::StoreHandle;

/// The remote per-task record of saved intervals.
#[async_trait]
pub trait TimeStore: Send + Sync {
    /// All saved intervals for the task in recording order; empty if none.
    async fn fetch_intervals(&self, task_id: &str) -> Result<Vec<Interval>, TrackError>;

    /// Durably add one interval and return it with its stable id.
    async fn append_interval(&self, task_id: &str, seconds: u64) -> Result<Interval, TrackError>;

    /// Remove exactly the interval with `interval_id`. `Ok(false)` if it was already gone.
    async fn remove_interval(&self, task_id: &str, interval_id: &str) -> Result<bool, TrackError>;

    /// Title shown in the save confirmation.
    async fn task_title(&self, _task_id: &str) -> Result<Option<String>, TrackError> {
        Ok(None)
    }
}

#[async_trait]
impl TimeStore for StoreHandle {
    async fn fetch_intervals(&self, task_id: &str) -> Result<Vec<Interval>, TrackError> {
        StoreHandle::fetch_intervals(self, task_id)
            .await
            .map_err(store_error)
    }

    async fn append_interval(&self, task_id: &str, seconds: u64) -> Result<Interval, TrackError> {
        StoreHandle::append_interval(self, task_id, seconds)
            .await
            .map_err(store_error)
    }

    async fn remove_interval(&self, task_id: &str, interval_id: &str) -> Result<bool, TrackError> {
        StoreHandle::remove_interval(self, task_id, interval_id)
            .await
            .map_err(store_error)
    }

    async fn task_title(&self, task_id: &str) -> Result<Option<String>, TrackError> {
        let task = self.get_task(task_id).await.map_err(store_error)?;
        Ok(task.map(|t| t.title))
    }
}

/// Keep typed errors raised inside the store (e.g. unknown task) intact.
fn store_error(err: anyhow::Error) -> TrackError {
    match err.downcast::<TrackError>() {
        Ok(typed) => typed,
        Err(other) => TrackError::Store(other.to_string()),
    }
}

/// Bound a Time Store call. Elapsed deadlines become `RemoteTimeout`.
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T, TrackError>
where
    F: Future<Output = Result<T, TrackError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(TrackError::RemoteTimeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{spawn_store_server, Store};

    #[tokio::test]
    async fn test_store_handle_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let user = store.insert_user("Ada", "L", "ada@example.com").unwrap();
        let project = store.insert_project(&user.id, "P").unwrap();
        let task = store
            .insert_task(&project.id, "Notes", None, None, None)
            .unwrap();
        let (handle, _join) = spawn_store_server(store);
        let remote: &dyn TimeStore = &handle;

        let saved = remote.append_interval(&task.id, 42).await.unwrap();
        let listed = remote.fetch_intervals(&task.id).await.unwrap();
        assert_eq!(listed, vec![saved.clone()]);
        assert_eq!(
            remote.task_title(&task.id).await.unwrap().as_deref(),
            Some("Notes")
        );

        assert!(remote.remove_interval(&task.id, &saved.id).await.unwrap());
        assert!(remote.fetch_intervals(&task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_task_keeps_typed_error() {
        let store = Store::open_in_memory().unwrap();
        let (handle, _join) = spawn_store_server(store);
        let err = TimeStore::append_interval(&handle, "ghost", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackError::TaskNotFound { ref id } if id == "ghost"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let result: Result<(), TrackError> = with_timeout(
            "fetch_intervals",
            Duration::from_millis(50),
            std::future::pending(),
        )
        .await;
        assert!(matches!(
            result,
            Err(TrackError::RemoteTimeout { timeout_ms: 50, .. })
        ));
    }
}
