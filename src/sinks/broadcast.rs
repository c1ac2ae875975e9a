use async_trait::async_trait;
use tokio::sync::broadcast;

use super::AlertSink;
use crate::api::ws_types::WsMessage;
use crate::errors::SinkError;
use crate::models::Alert;

/// Fans alerts out to connected dashboard WebSocket clients.
///
/// Having no subscribers is not a failure; the alert is simply not seen.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<WsMessage>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<WsMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AlertSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        let receivers = self.tx.send(WsMessage::Alert(alert.clone())).unwrap_or(0);
        tracing::debug!(receivers, trade_id = %alert.trade().id(), "Alert broadcast");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Market, Side, Signal, SignalType, Trade, WalletProfile};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn alert() -> Alert {
        let trade = Trade::new("t1", "m1", "0xabc", Side::Yes, Decimal::from(5_000), Decimal::new(5, 1), Utc::now())
            .unwrap();
        Alert::new(
            trade,
            Market::unknown("m1"),
            WalletProfile::empty("0xabc"),
            vec![Signal::new(SignalType::Timing, Confidence::new(Decimal::new(7, 1)), "late")],
            Confidence::new(Decimal::new(7, 1)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_delivers_to_subscribers() {
        let (tx, mut rx) = broadcast::channel(8);
        let sink = BroadcastSink::new(tx);
        sink.send(&alert()).await.unwrap();

        match rx.recv().await.unwrap() {
            WsMessage::Alert(a) => assert_eq!(a.trade().id(), "t1"),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_subscribers_is_ok() {
        let (tx, _) = broadcast::channel(8);
        assert!(BroadcastSink::new(tx).send(&alert()).await.is_ok());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(WsMessage::Alert(alert())).unwrap();
        assert_eq!(json["type"], "alert");
        assert_eq!(json["data"]["signals"][0]["signal_type"], "Timing");
    }
}
