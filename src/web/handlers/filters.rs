// GET /filters — the category filters applied to the live event stream.
// POST /filters (and the older POST /updateFilters) — replace them.
// GET /filters/edit — a checkbox form that posts to /updateFilters.
//
// The body is the full filter object, e.g. {"chitChat": false, "police": true,
// "jam": true, "accident": true, "unknown": false}. Missing fields are false.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use tracing::warn;

use crate::pipeline::persist;
use crate::state::CategoryFilters;
use crate::web::{api_error, AppState};

pub async fn get_filters(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.filters.get())
}

pub async fn edit_filters(State(state): State<AppState>) -> Html<String> {
    Html(render_form(&state.filters.get()))
}

fn render_form(filters: &CategoryFilters) -> String {
    let boxes: String = [
        ("chit_chat", "Comment", filters.chit_chat),
        ("police", "Police", filters.police),
        ("jam", "Traffic jam", filters.jam),
        ("accident", "Accident", filters.accident),
        ("unknown", "Other", filters.unknown),
    ]
    .iter()
    .map(|(name, label, on)| {
        let checked = if *on { " checked" } else { "" };
        format!(
            "    <label><input type=\"checkbox\" name=\"{name}\"{checked}> {label}</label><br>\n"
        )
    })
    .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Live stream filters</title></head>
<body>
  <h1>Live stream filters</h1>
  <form id="filterForm">
{boxes}    <button type="submit">Save</button>
  </form>
  <script>
    document.getElementById('filterForm').addEventListener('submit', function (event) {{
      event.preventDefault();
      const filters = {{}};
      for (const input of this.querySelectorAll('input[type=checkbox]')) {{
        filters[input.name] = input.checked;
      }}
      fetch('/updateFilters', {{
        method: 'POST',
        headers: {{ 'Content-Type': 'application/json' }},
        body: JSON.stringify(filters),
      }})
        .then((res) => alert(res.ok ? 'Filters updated' : 'Could not update filters'))
        .catch((error) => {{
          alert('Could not update filters');
          console.error(error);
        }});
    }});
  </script>
</body>
</html>
"#
    )
}

pub async fn update_filters(State(state): State<AppState>, body: Bytes) -> Response {
    let new_filters: CategoryFilters = match serde_json::from_slice(&body) {
        Ok(filters) => filters,
        Err(e) => {
            return api_error(StatusCode::BAD_REQUEST, &format!("Invalid filters: {e}"));
        }
    };

    // The live filters change even if the save fails; the next successful
    // update persists them.
    if let Err(e) = persist::update_filters(state.store.as_ref(), &state.filters, new_filters).await
    {
        warn!(error = %e, "Filters applied but not persisted");
    }
    StatusCode::NO_CONTENT.into_response()
}
