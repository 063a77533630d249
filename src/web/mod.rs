// Web server — Axum backend for the live alert stream and filter settings.
//
// /events is a Server-Sent Events stream fed by the FanoutHub; /alerts and
// /filters are plain JSON. The server shares the running App's components,
// it owns none of its own.

use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::App;
use crate::db::StateStore;
use crate::hub::FanoutHub;
use crate::state::{DedupStore, FilterStore, PeakCounter};

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<FanoutHub>,
    pub filters: Arc<FilterStore>,
    pub store: Arc<dyn StateStore>,
    pub dedup: Arc<DedupStore>,
    pub peak: Arc<PeakCounter>,
}

impl From<&App> for AppState {
    fn from(app: &App) -> Self {
        Self {
            hub: app.hub.clone(),
            filters: app.filters.clone(),
            store: app.store.clone(),
            dedup: app.dedup.clone(),
            peak: app.peak.clone(),
        }
    }
}

/// Start the Axum web server and run until `shutdown` flips to true.
pub async fn run_server(
    state: AppState,
    bind: &str,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("Wazewatch listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/alerts", get(handlers::alerts::list_alerts))
        .route("/events", get(handlers::events::stream_events))
        .route(
            "/filters",
            get(handlers::filters::get_filters).post(handlers::filters::update_filters),
        )
        .route("/filters/edit", get(handlers::filters::edit_filters))
        .route(
            "/updateFilters",
            axum::routing::post(handlers::filters::update_filters),
        )
        .route("/api/status", get(handlers::status::get_status))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check — always returns 200 OK.
async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "status": "ok" })),
    )
}

async fn index() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Live alerts: GET /events (add ?replay=true for history)\n\
         Alert history: GET /alerts\n\
         Filters: GET /filters, POST /filters\n\
         Filter form: GET /filters/edit\n",
    )
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}
