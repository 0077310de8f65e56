// src/cli/serve.rs — Long-running API server with a live timer

use std::sync::Arc;

use super::open_store;
use crate::api::{self, ApiState};
use crate::infra::config::Config;
use crate::infra::paths;
use crate::store::spawn_store_server;
use crate::timer::{spawn_timer_server, FileStorage, SystemClock, TimerEngine};

pub async fn run_serve(port: Option<u16>, config: &Config) -> anyhow::Result<()> {
    paths::ensure_dirs().await?;
    let store = open_store()?;
    let (store_handle, _store_join) = spawn_store_server(store);

    let storage = FileStorage::open(&paths::timer_state_path());
    tracing::info!("Timer state file: {}", storage.path().display());

    let engine = TimerEngine::restore(
        Arc::new(store_handle.clone()),
        Arc::new(storage),
        Arc::new(SystemClock),
        config.timer.clone(),
    )
    .await;
    let (timer, timer_join) = spawn_timer_server(engine, &config.timer);

    let mut api_config = config.api.clone();
    if let Some(port) = port {
        api_config.port = port;
    }
    if api_config.token.is_none() {
        tracing::warn!("API token not set; timer endpoints are unauthenticated");
    }

    let state = ApiState {
        timer,
        store: store_handle,
        token: api_config.token.clone(),
        calendar: config.calendar.clone(),
    };
    println!("Serving on http://127.0.0.1:{}", api_config.port);
    api::start_server(&api_config, state).await?;

    // The router held the last timer handle
    timer_join.await?;
    Ok(())
}
