use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::errors::SourceError;
use crate::models::{Side, Trade, TradeError};
use crate::polymarket::types::{parse_timestamp, WsSubscribe, WsTrade};

const PING_INTERVAL: Duration = Duration::from_secs(25);
const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(2);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct WsListenerConfig {
    pub url: String,
    pub asset_ids: Vec<String>,
    /// Consecutive failed connection attempts before the feed is declared
    /// disconnected. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
}

/// Run the WebSocket listener loop, forwarding decoded trades to `tx`.
///
/// Reconnects with capped exponential backoff. When the attempt budget runs
/// out a `SourceError::Disconnected` is sent and the listener returns. It
/// also returns when `shutdown` flips to true or the receiver is dropped.
pub async fn run_ws_listener(
    config: WsListenerConfig,
    tx: mpsc::Sender<Result<Trade, SourceError>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return;
        }
        tracing::info!(url = %config.url, "Connecting to Polymarket WebSocket...");

        match connect_async(config.url.as_str()).await {
            Ok((ws_stream, _response)) => {
                tracing::info!("WebSocket connected successfully");
                attempt = 0;

                let (mut write, mut read) = ws_stream.split();

                let sub = WsSubscribe::market(&config.asset_ids);
                match serde_json::to_string(&sub) {
                    Ok(msg) => {
                        if let Err(e) = write.send(Message::Text(msg.into())).await {
                            tracing::error!(error = %e, "Failed to send subscribe message");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to encode subscribe message"),
                }
                tracing::info!(asset_count = config.asset_ids.len(), "Subscribed to trade feed");

                let mut ping_timer = interval(PING_INTERVAL);
                ping_timer.tick().await; // consume the first immediate tick

                loop {
                    tokio::select! {
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if !forward_trades(text.as_ref(), &tx).await {
                                        tracing::info!("Trade receiver dropped, stopping listener");
                                        return;
                                    }
                                }
                                Some(Ok(Message::Ping(data))) => {
                                    if let Err(e) = write.send(Message::Pong(data)).await {
                                        tracing::warn!(error = %e, "Failed to send pong");
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(_))) => {
                                    tracing::warn!("WebSocket server sent close frame");
                                    break;
                                }
                                Some(Ok(_)) => {} // Binary, Pong, Frame: ignored
                                Some(Err(e)) => {
                                    tracing::error!(error = %e, "WebSocket read error");
                                    break;
                                }
                                None => {
                                    tracing::warn!("WebSocket stream ended");
                                    break;
                                }
                            }
                        }
                        _ = ping_timer.tick() => {
                            if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                                tracing::warn!(error = %e, "Failed to send ping");
                                break;
                            }
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                tracing::info!("Shutdown requested, closing WebSocket");
                                let _ = write.send(Message::Close(None)).await;
                                return;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "WebSocket connection failed");
            }
        }

        attempt = attempt.saturating_add(1);
        if config.max_reconnect_attempts.is_some_and(|max| attempt > max) {
            tracing::error!(attempt, "Reconnect budget exhausted");
            let _ = tx
                .send(Err(SourceError::Disconnected(format!(
                    "{} unreachable after {} attempts",
                    config.url,
                    attempt - 1
                ))))
                .await;
            return;
        }

        // Exponential backoff with cap
        let delay = BASE_RECONNECT_DELAY * 2u32.saturating_pow(attempt - 1);
        let delay = delay.min(MAX_RECONNECT_DELAY);
        tracing::info!(delay_secs = delay.as_secs(), attempt, "Reconnecting...");
        tokio::select! {
            _ = sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

/// Decode a text frame and forward every trade in it. Returns false once the
/// receiving side is gone.
async fn forward_trades(text: &str, tx: &mpsc::Sender<Result<Trade, SourceError>>) -> bool {
    for ws_trade in parse_trades(text) {
        if !ws_trade.is_trade_event() {
            continue;
        }
        let item = match convert_ws_trade(&ws_trade) {
            Ok(Some(trade)) => Ok(trade),
            Ok(None) => {
                tracing::debug!(raw = %text, "Dropping WS trade with missing fields");
                continue;
            }
            Err(e) => Err(SourceError::Malformed(e)),
        };
        if tx.send(item).await.is_err() {
            return false;
        }
    }
    true
}

/// Parse an incoming text message, which may be:
/// - A JSON array of trades: `[{...}, {...}]`
/// - A single trade object: `{...}`
/// - A wrapper with a `data` field: `{"data": [{...}]}`
pub fn parse_trades(text: &str) -> Vec<WsTrade> {
    if let Ok(trades) = serde_json::from_str::<Vec<WsTrade>>(text) {
        return trades;
    }

    if let Ok(wrapper) = serde_json::from_str::<serde_json::Value>(text) {
        if let Some(data) = wrapper.get("data") {
            if let Ok(trades) = serde_json::from_value::<Vec<WsTrade>>(data.clone()) {
                return trades;
            }
        }
    }

    if let Ok(trade) = serde_json::from_str::<WsTrade>(text) {
        return vec![trade];
    }

    // Not a trade message (e.g. subscription ack, heartbeat)
    tracing::trace!(raw = %text, "Non-trade message received");
    Vec::new()
}

/// BUY takes the YES side at `price`; SELL is treated as buying NO at
/// `1 - price`. `size` is in shares, so the USD size is shares times the
/// price paid for the side taken.
///
/// `Ok(None)` when required fields are missing, `Err` when present fields
/// fail trade validation.
pub fn convert_ws_trade(ws: &WsTrade) -> Result<Option<Trade>, TradeError> {
    let Some(wallet) = ws.taker_address.as_deref().or(ws.maker_address.as_deref()) else {
        return Ok(None);
    };
    let Some(side) = ws.side.as_deref().and_then(Side::from_api_str) else {
        return Ok(None);
    };
    let Some(market_id) = ws.market.as_deref().or(ws.asset_id.as_deref()) else {
        return Ok(None);
    };

    let shares = ws
        .size
        .as_deref()
        .and_then(|s| Decimal::from_str(s).ok())
        .unwrap_or(Decimal::ZERO);
    let quoted = ws
        .price
        .as_deref()
        .and_then(|s| Decimal::from_str(s).ok())
        .unwrap_or(Decimal::new(5, 1));

    let price = match side {
        Side::Yes => quoted,
        Side::No => Decimal::ONE - quoted,
    };

    let timestamp = ws
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(chrono::Utc::now);

    let id = ws
        .transaction_hash
        .clone()
        .or_else(|| ws.id.clone())
        .unwrap_or_else(|| format!("{}-{}-{}", market_id, timestamp.timestamp_millis(), shares));

    Trade::new(id, market_id, wallet, side, shares * price, price, timestamp)
        .map(|t| Some(t.with_raw(serde_json::to_value(ws).unwrap_or_default())))
}
