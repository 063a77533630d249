// Feed traits — the swap-ready seams between the scheduler jobs and the
// HTTP feeds. Tests plug in canned implementations; production uses
// WazeClient for both.

use anyhow::Result;
use async_trait::async_trait;

use crate::alerts::Alert;

/// Supplies one batch of raw alerts per call.
#[async_trait]
pub trait AlertFeed: Send + Sync {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>>;
}

/// Supplies one concurrent-user sample per call.
#[async_trait]
pub trait UserCountFeed: Send + Sync {
    async fn fetch_users_online(&self) -> Result<i64>;
}
