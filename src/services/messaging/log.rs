use async_trait::async_trait;

use super::CodeChannel;

/// Development channel: writes the message to the log instead of sending it.
pub struct LogChannel;

#[async_trait]
impl CodeChannel for LogChannel {
    async fn send(&self, to: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, body = %body, "code channel not configured, logging message");
        Ok(())
    }
}
