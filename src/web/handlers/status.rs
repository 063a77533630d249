// GET /api/status — hub counters plus the live dedup, peak and filter state.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tracing::warn;

use crate::web::AppState;

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let last_saved_at = match state.store.last_saved_at().await {
        Ok(at) => at,
        Err(e) => {
            warn!(error = %e, "Could not read last save time");
            None
        }
    };

    Json(serde_json::json!({
        "hub": state.hub.stats(),
        "processed_alerts": state.dedup.len(),
        "peak_users_online": state.peak.current(),
        "filters": state.filters.get(),
        "last_saved_at": last_saved_at,
    }))
}
