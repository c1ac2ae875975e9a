//! Alert destinations.

pub mod broadcast;
pub mod console;
pub mod telegram;

pub use broadcast::BroadcastSink;
pub use console::ConsoleSink;
pub use telegram::TelegramSink;

use async_trait::async_trait;

use crate::errors::SinkError;
use crate::models::Alert;

/// A destination for alerts. A failing sink only affects its own delivery.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &Alert) -> Result<(), SinkError>;
}
