// GET /events — live alert stream over Server-Sent Events.
//
// Each connection registers a hub subscriber and keeps a cursor into the
// alert log. On every wake it emits the entries past the cursor whose
// category passes the filters in effect at that moment. ?replay=true starts
// the cursor at the beginning of the log instead of the end.
//
// The subscription lives inside the stream, so a client disconnect drops it
// and the hub forgets the subscriber.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::{self, Stream};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::hub::{FanoutHub, LoggedAlert, Subscription};
use crate::state::FilterStore;
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct EventsQuery {
    #[serde(default)]
    pub replay: bool,
}

struct EventCursor {
    subscription: Subscription,
    cursor: usize,
    hub: Arc<FanoutHub>,
    filters: Arc<FilterStore>,
    pending: VecDeque<Arc<LoggedAlert>>,
}

impl EventCursor {
    /// Move every log entry past the cursor into `pending`, dropping the
    /// ones the current filters reject. Returns false if nothing was new.
    fn catch_up(&mut self) -> bool {
        let fresh = self.hub.log().since(self.cursor);
        if fresh.is_empty() {
            return false;
        }
        self.cursor += fresh.len();
        let filters = self.filters.get();
        self.pending
            .extend(fresh.into_iter().filter(|entry| filters.allows(entry.category)));
        true
    }
}

fn to_event(entry: &LoggedAlert) -> Option<Event> {
    match Event::default()
        .event(entry.category.as_str())
        .id(entry.seq.to_string())
        .json_data(entry)
    {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(seq = entry.seq, error = %e, "Could not encode alert for the event stream");
            None
        }
    }
}

/// The stream of SSE events for one subscriber. Ends when the subscription
/// is removed from the hub.
pub fn alert_events(
    hub: Arc<FanoutHub>,
    filters: Arc<FilterStore>,
    replay: bool,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    // Subscribe before reading the log length so nothing slips between them
    let subscription = hub.subscribe();
    let cursor = if replay { 0 } else { hub.log().len() };
    debug!(subscriber = subscription.id(), cursor, "Event stream opened");

    let state = EventCursor {
        subscription,
        cursor,
        hub,
        filters,
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            while let Some(entry) = state.pending.pop_front() {
                if let Some(event) = to_event(&entry) {
                    return Some((Ok(event), state));
                }
            }
            if state.catch_up() {
                continue;
            }
            if !state.subscription.woken().await {
                return None;
            }
        }
    })
}

pub async fn stream_events(
    State(state): State<AppState>,
    Query(params): Query<EventsQuery>,
) -> impl IntoResponse {
    let events = alert_events(state.hub.clone(), state.filters.clone(), params.replay);
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{classify, Alert};
    use crate::state::CategoryFilters;
    use futures::StreamExt;
    use serde_json::json;

    async fn dispatch(hub: &FanoutHub, id: &str, tag: &str) {
        let alert = Alert::from_value(json!({"uuid": id, "type": tag})).unwrap();
        let (category, rendered) = classify(&alert).unwrap();
        hub.dispatch(alert, category, rendered).await;
    }

    #[tokio::test]
    async fn test_replay_emits_only_allowed_categories() {
        let hub = Arc::new(FanoutHub::new(None));
        dispatch(&hub, "a1", "JAM").await;
        dispatch(&hub, "a2", "POLICE").await;
        dispatch(&hub, "a3", "JAM").await;

        let mut filters = CategoryFilters::default();
        filters.jam = true;
        let filters = Arc::new(FilterStore::new(filters));

        let events = alert_events(hub.clone(), filters, true);
        let first: Vec<_> = events.take(2).collect().await;
        assert_eq!(first.len(), 2);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_live_stream_sees_new_alerts_only() {
        let hub = Arc::new(FanoutHub::new(None));
        dispatch(&hub, "old", "JAM").await;

        let events = alert_events(hub.clone(), Arc::new(FilterStore::new(CategoryFilters::all())), false);
        futures::pin_mut!(events);
        assert_eq!(hub.subscriber_count(), 1);

        dispatch(&hub, "new", "ACCIDENT").await;
        let next = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("no event arrived");
        assert!(next.is_some());

        // Nothing else pending
        let more = tokio::time::timeout(Duration::from_millis(50), events.next()).await;
        assert!(more.is_err());
    }
}
