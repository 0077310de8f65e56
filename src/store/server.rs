// src/store/server.rs — Async message passing for Store
//
// The SQLite connection lives on a single background task. Everything async
// (the timer service, HTTP handlers) talks to it through a cloneable
// `StoreHandle`.

use tokio::sync::{mpsc, oneshot};

use super::sqlite::Store;
use super::types::{Interval, Task, User};

#[derive(Debug)]
pub enum StoreCommand {
    FetchIntervals {
        task_id: String,
        resp: oneshot::Sender<anyhow::Result<Vec<Interval>>>,
    },
    AppendInterval {
        task_id: String,
        seconds: u64,
        resp: oneshot::Sender<anyhow::Result<Interval>>,
    },
    RemoveInterval {
        task_id: String,
        interval_id: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    GetTask {
        id: String,
        resp: oneshot::Sender<anyhow::Result<Option<Task>>>,
    },
    FindUserByCalendarToken {
        token: String,
        resp: oneshot::Sender<anyhow::Result<Option<User>>>,
    },
    TasksForUser {
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<Vec<Task>>>,
    },
}

/// A handle to the Store that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    pub async fn fetch_intervals(&self, task_id: &str) -> anyhow::Result<Vec<Interval>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::FetchIntervals {
                task_id: task_id.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn append_interval(&self, task_id: &str, seconds: u64) -> anyhow::Result<Interval> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::AppendInterval {
                task_id: task_id.to_string(),
                seconds,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn remove_interval(&self, task_id: &str, interval_id: &str) -> anyhow::Result<bool> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::RemoveInterval {
                task_id: task_id.to_string(),
                interval_id: interval_id.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn get_task(&self, id: &str) -> anyhow::Result<Option<Task>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::GetTask {
                id: id.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn find_user_by_calendar_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::FindUserByCalendarToken {
                token: token.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn tasks_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Task>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::TasksForUser {
                user_id: user_id.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }
}

/// Helper to spawn the store server and return a handle.
pub fn spawn_store_server(store: Store) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(100);
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// The background task that owns the Store.
pub async fn run_store_server(store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::FetchIntervals { task_id, resp } => {
                let _ = resp.send(store.fetch_intervals(&task_id));
            }
            StoreCommand::AppendInterval {
                task_id,
                seconds,
                resp,
            } => {
                let _ = resp.send(store.append_interval(&task_id, seconds));
            }
            StoreCommand::RemoveInterval {
                task_id,
                interval_id,
                resp,
            } => {
                let _ = resp.send(store.remove_interval(&task_id, &interval_id));
            }
            StoreCommand::GetTask { id, resp } => {
                let _ = resp.send(store.get_task(&id));
            }
            StoreCommand::FindUserByCalendarToken { token, resp } => {
                let _ = resp.send(store.find_user_by_calendar_token(&token));
            }
            StoreCommand::TasksForUser { user_id, resp } => {
                let _ = resp.send(store.tasks_for_user(&user_id));
            }
        }
    }
    tracing::debug!("Store server stopped: all handles dropped");
}
