// src/api/mod.rs — HTTP API over the timer service and calendar feed

pub mod auth;
pub mod handlers;
pub mod types;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::infra::config::{ApiConfig, CalendarConfig};
use crate::store::StoreHandle;
use crate::timer::TimerHandle;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub timer: TimerHandle,
    pub store: StoreHandle,
    pub token: Option<String>,
    pub calendar: CalendarConfig,
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/v1/timer", get(handlers::get_timer))
        .route("/api/v1/timer/select", post(handlers::select_task))
        .route("/api/v1/timer/start", post(handlers::start))
        .route("/api/v1/timer/pause", post(handlers::pause))
        .route("/api/v1/timer/toggle", post(handlers::toggle))
        .route("/api/v1/timer/save", post(handlers::save))
        .route("/api/v1/timer/reset", post(handlers::reset))
        .route("/api/v1/timer/reconcile", post(handlers::reconcile))
        .route("/api/v1/timer/selection", delete(handlers::clear_selection))
        .route("/api/v1/timer/records/{index}", delete(handlers::delete_record))
        .route("/api/v1/timer/notifications", get(handlers::notifications))
        .route("/api/v1/health", get(handlers::health))
        .route("/api/calendar/{token}", get(handlers::calendar_feed))
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given port (blocking).
pub async fn start_server(config: &ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let port = config.port;
    let addr = format!("127.0.0.1:{port}");

    let router = build_router(state);

    tracing::info!("API server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
