// Push-notification sinks — where rendered alerts and the users report go.

pub mod telegram;
pub mod traits;

pub use telegram::TelegramSink;
pub use traits::{PushSink, StdoutSink};
