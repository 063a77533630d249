// System status display — what the state database says about the last run.

use anyhow::Result;
use colored::Colorize;

use crate::db::StateStore;
use crate::state::dedup::parse_snapshot;
use crate::state::CategoryFilters;

/// Display persisted status to the terminal.
pub async fn show(store: &dyn StateStore, db_display_path: &str) -> Result<()> {
    println!("Database: {db_display_path}");

    let state = store.load().await?;

    match state.processed_alerts.as_deref() {
        Some(raw) => match parse_snapshot(raw) {
            Ok(entries) => println!("Processed alerts: {}", entries.len()),
            Err(_) => println!("Processed alerts: {}", "snapshot is malformed".red()),
        },
        None => println!("Processed alerts: none saved yet"),
    }

    println!(
        "Peak users since last report: {}",
        state.max_users_online.as_deref().unwrap_or("0")
    );

    let filters = state
        .filters
        .as_deref()
        .and_then(|raw| serde_json::from_str::<CategoryFilters>(raw).ok())
        .unwrap_or_default();
    println!("Live stream filters: {}", describe_filters(&filters));

    match store.last_saved_at().await? {
        Some(at) => println!("Last snapshot: {at}"),
        None => println!("Last snapshot: {}", "never".dimmed()),
    }

    Ok(())
}

/// "police, jam" or "none".
pub fn describe_filters(filters: &CategoryFilters) -> String {
    let enabled = filters.enabled();
    if enabled.is_empty() {
        "none".to_string()
    } else {
        enabled
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_filters() {
        assert_eq!(describe_filters(&CategoryFilters::default()), "none");
        assert_eq!(
            describe_filters(&CategoryFilters::from_names("jam,comment").unwrap()),
            "comment, jam"
        );
    }
}
