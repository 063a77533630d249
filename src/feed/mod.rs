// Feed collaborators — where raw alerts and user-count samples come from.

pub mod client;
pub mod traits;

pub use client::{AreaBounds, WazeClient};
pub use traits::{AlertFeed, UserCountFeed};
