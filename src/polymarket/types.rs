use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Trade (Data API, REST)
// ---------------------------------------------------------------------------

/// A fill as returned by `GET /trades`, optionally narrowed to one wallet.
/// `side` is the direction (BUY/SELL) on the token named by `outcome`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiTrade {
    #[serde(default, alias = "proxyWallet")]
    pub proxy_wallet: Option<String>,
    #[serde(default, alias = "conditionId")]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Epoch seconds, sometimes sent as a string.
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default, alias = "transactionHash")]
    pub transaction_hash: Option<String>,
    /// Outcome token id.
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default, alias = "outcomeIndex")]
    pub outcome_index: Option<u32>,
}

impl ApiTrade {
    pub fn notional(&self) -> Decimal {
        self.size.unwrap_or(Decimal::ZERO) * self.price.unwrap_or(Decimal::ZERO)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.timestamp.as_ref()? {
            serde_json::Value::Number(n) => n.as_i64().and_then(from_epoch),
            serde_json::Value::String(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Trade (WebSocket)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WsTrade {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub maker_address: Option<String>,
    #[serde(default)]
    pub taker_address: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

impl WsTrade {
    /// Events that carry a fill. Price-change and book events do not.
    pub fn is_trade_event(&self) -> bool {
        matches!(self.event_type.as_deref(), None | Some("trade") | Some("last_trade_price"))
    }
}

// ---------------------------------------------------------------------------
// WebSocket subscribe message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct WsSubscribe {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub assets_ids: Vec<String>,
}

impl WsSubscribe {
    /// Polymarket WS format: {"type": "market", "assets_ids": ["id1", "id2", ...]}
    pub fn market(asset_ids: &[String]) -> Self {
        Self {
            msg_type: "market".into(),
            assets_ids: asset_ids.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Epoch seconds or milliseconds.
fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value > 10_000_000_000 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

/// Parse epoch seconds, epoch millis or RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(n) = raw.parse::<i64>() {
        return from_epoch(n);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
