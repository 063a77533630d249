// PushSink trait — one best-effort delivery attempt per call.
//
// Implementations must not retry; the fan-out hub logs a failure and moves
// on. StdoutSink is what runs when no messaging credentials are configured.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PushSink: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// Deliver one text message.
    async fn send(&self, text: &str) -> Result<()>;
}

/// Prints every message to stdout.
pub struct StdoutSink;

#[async_trait]
impl PushSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn send(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }
}
