pub mod log;
pub mod twilio;

use async_trait::async_trait;

/// Out-of-band delivery of one-time codes to a customer contact address.
#[async_trait]
pub trait CodeChannel: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> anyhow::Result<()>;
}
