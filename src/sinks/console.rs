use async_trait::async_trait;

use super::AlertSink;
use crate::errors::SinkError;
use crate::models::{short_address, Alert};

/// Writes each alert to the log as one structured event.
#[derive(Debug, Default, Clone)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        let trade = alert.trade();
        let signals = alert
            .signals()
            .iter()
            .map(|s| s.signal_type.as_str())
            .collect::<Vec<_>>()
            .join(",");

        tracing::info!(
            trade_id = %trade.id(),
            wallet = %short_address(trade.wallet()),
            market = %alert.market().question,
            category = alert.market().category.as_str(),
            side = %trade.side(),
            size_usd = %trade.size_usd().round_dp(2),
            price = %trade.price(),
            odds_before = %alert.odds_before(),
            odds_after = %alert.odds_after(),
            signals = %signals,
            confidence = %alert.confidence(),
            "ALERT"
        );

        for signal in alert.signals() {
            tracing::info!(
                trade_id = %trade.id(),
                signal = signal.signal_type.as_str(),
                confidence = %signal.confidence,
                "  {}",
                signal.description
            );
        }

        Ok(())
    }
}
