// HTTP client for the Waze live-map feeds.
//
// Two endpoints: the georss feed returns `{"alerts": [...]}` for a bounding
// box, and the broadcast feed returns `{"usersOnJams": [{"wazersCount": n}]}`
// whose counts sum to the number of users currently online.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::{AlertFeed, UserCountFeed};
use crate::alerts::Alert;
use crate::error::WatchError;

/// Default georss endpoint (bounds are appended as query parameters).
pub const DEFAULT_FEED_URL: &str =
    "https://www.waze.com/row-rtserver/web/TGeoRSS?tk=community&format=JSON";

/// Default broadcast endpoint for the user count.
pub const DEFAULT_BROADCAST_URL: &str =
    "https://www.waze.com/row-rtserver/broadcast/BroadcastRSS?buid=22c8ece8ae5b984902e7d1c69f5db4bf&format=JSON";

/// Geographic bounding box for the alert query, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaBounds {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for AreaBounds {
    fn default() -> Self {
        Self {
            left: -49.640,
            right: -49.230,
            top: -27.150,
            bottom: -27.800,
        }
    }
}

impl AreaBounds {
    /// Parse `left,right,top,bottom`.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("Invalid bounds '{s}', expected left,right,top,bottom"))?;
        let &[left, right, top, bottom] = parts.as_slice() else {
            anyhow::bail!("Invalid bounds '{s}', expected exactly four numbers");
        };
        Ok(Self {
            left,
            right,
            top,
            bottom,
        })
    }

    /// Query parameters the georss endpoint expects, 4 decimal places each.
    pub fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("left", format!("{:.4}", self.left)),
            ("right", format!("{:.4}", self.right)),
            ("top", format!("{:.4}", self.top)),
            ("bottom", format!("{:.4}", self.bottom)),
        ]
    }
}

/// Thin reqwest wrapper for both Waze feeds.
pub struct WazeClient {
    client: reqwest::Client,
    feed_url: String,
    broadcast_url: String,
    bounds: AreaBounds,
}

impl WazeClient {
    pub fn new(feed_url: &str, broadcast_url: &str, bounds: AreaBounds) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("wazewatch/0.1")
            .timeout(Duration::from_secs(20))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            feed_url: feed_url.to_string(),
            broadcast_url: broadcast_url.to_string(),
            bounds,
        })
    }

    async fn get_json(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| WatchError::TransientFetch(format!("{what}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(WatchError::TransientFetch(format!("{what} returned {status}")).into());
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| WatchError::MalformedPayload(format!("{what}: {e}")))?;
        Ok(body)
    }
}

#[async_trait]
impl AlertFeed for WazeClient {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        debug!("Fetching alerts");
        let request = self
            .client
            .get(&self.feed_url)
            .query(&self.bounds.query_pairs());
        let body = self.get_json(request, "alert feed").await?;
        Ok(parse_alerts(body)?)
    }
}

#[async_trait]
impl UserCountFeed for WazeClient {
    async fn fetch_users_online(&self) -> Result<i64> {
        debug!("Fetching users online");
        let request = self.client.get(&self.broadcast_url);
        let body = self.get_json(request, "broadcast feed").await?;
        Ok(parse_users_online(&body)?)
    }
}

/// Pull the alert records out of a georss response.
///
/// A missing or non-array `alerts` key fails the whole payload. Individual
/// entries that aren't JSON objects are dropped with a warning.
pub fn parse_alerts(body: Value) -> Result<Vec<Alert>, WatchError> {
    let Value::Object(mut root) = body else {
        return Err(WatchError::MalformedPayload(
            "alert feed response is not an object".to_string(),
        ));
    };
    let Some(Value::Array(raw)) = root.remove("alerts") else {
        return Err(WatchError::MalformedPayload(
            "'alerts' key not found or not an array".to_string(),
        ));
    };

    let total = raw.len();
    let alerts: Vec<Alert> = raw.into_iter().filter_map(Alert::from_value).collect();
    if alerts.len() < total {
        warn!(
            dropped = total - alerts.len(),
            "Alert feed contained non-object entries"
        );
    }
    Ok(alerts)
}

/// Sum `usersOnJams[].wazersCount` from a broadcast response.
pub fn parse_users_online(body: &Value) -> Result<i64, WatchError> {
    let jams = body
        .get("usersOnJams")
        .and_then(Value::as_array)
        .ok_or_else(|| WatchError::MalformedPayload("'usersOnJams' missing".to_string()))?;

    jams.iter().try_fold(0i64, |total, jam| {
        let count = jam
            .get("wazersCount")
            .and_then(Value::as_f64)
            .ok_or_else(|| WatchError::MalformedPayload("jam without wazersCount".to_string()))?;
        total
            .checked_add(count as i64)
            .ok_or_else(|| WatchError::MalformedPayload("wazersCount total overflows".to_string()))
    })
}
