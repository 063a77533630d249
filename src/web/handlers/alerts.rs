// GET /alerts — every dispatched alert, oldest first.
//
// Optional ?since= skips entries before that sequence number, so a client
// that already has the first N can fetch just the rest.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct AlertsQuery {
    pub since: Option<usize>,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertsQuery>,
) -> impl IntoResponse {
    let entries = state.hub.log().since(params.since.unwrap_or(0));
    let entries: Vec<_> = entries.iter().map(|entry| entry.as_ref()).collect();
    Json(serde_json::json!(entries))
}
