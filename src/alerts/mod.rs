// Alert records as they come off the feed, their categories, and the
// rendering that turns one into a human-readable notification.

pub mod classify;
pub mod models;

pub use classify::{classify, classify_at};
pub use models::{Alert, AlertCategory, RenderedNotification};
