// Alert classification and rendering.
//
// Pure functions: an alert goes in, a category and a rendered message come
// out. The wall-clock prefix is passed in by the caller so fixtures render
// deterministically.

use std::fmt::Write;

use chrono::NaiveTime;
use serde_json::Value;

use super::models::{Alert, AlertCategory, RenderedNotification};
use crate::error::WatchError;

/// Classify and render an alert without a timestamp prefix.
pub fn classify(alert: &Alert) -> Result<(AlertCategory, RenderedNotification), WatchError> {
    classify_at(alert, None)
}

/// Classify and render an alert. When `at` is given the message starts with
/// an `[HH:MM:SS]` prefix.
///
/// Fails with `MalformedAlert` only for Comment alerts that lack `reportBy`
/// or `location`. Every other category always renders.
pub fn classify_at(
    alert: &Alert,
    at: Option<NaiveTime>,
) -> Result<(AlertCategory, RenderedNotification), WatchError> {
    let category = AlertCategory::from_tag(alert.tag().unwrap_or_default());

    let body = match category {
        AlertCategory::Comment => render_comment(alert)?,
        AlertCategory::Police => with_details("📢 Police 🚓", alert),
        AlertCategory::Jam => with_details("📢 Traffic jam 🚗🚕🚙", alert),
        AlertCategory::Accident => with_details("📢 Accident 🚙💥🚕", alert),
        AlertCategory::Unknown => with_details("🤖 Unknown notification type", alert),
    };

    let text = match at {
        Some(t) => format!("[{}] {body}", t.format("%H:%M:%S")),
        None => body,
    };

    Ok((
        category,
        RenderedNotification {
            kind: category,
            text,
        },
    ))
}

fn render_comment(alert: &Alert) -> Result<String, WatchError> {
    let id = alert.id().unwrap_or("<no id>");
    let reporter = alert
        .str_field("reportBy")
        .ok_or_else(|| WatchError::malformed_alert(id, "comment without reportBy"))?;
    let location = alert
        .str_field("location")
        .ok_or_else(|| WatchError::malformed_alert(id, "comment without location"))?;

    Ok(format!(
        "📢 {reporter} left a comment on the map 💭\nLocation 🗺️: {location}"
    ))
}

fn with_details(headline: &str, alert: &Alert) -> String {
    format!("{headline}\n```{}```", format_fields(alert))
}

/// Dump every field as `key: value`, one per line, keys in sorted order.
pub fn format_fields(alert: &Alert) -> String {
    let mut keys: Vec<&String> = alert.fields().keys().collect();
    keys.sort();

    let mut out = String::new();
    for key in keys {
        let value = match &alert.fields()[key.as_str()] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "{key}: {value}");
    }
    out
}
