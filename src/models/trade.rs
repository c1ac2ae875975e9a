use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Side;

/// Reasons a raw trade event cannot become a [`Trade`].
#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    #[error("trade id is empty")]
    MissingId,

    #[error("market id is empty")]
    MissingMarket,

    #[error("wallet address is empty")]
    MissingWallet,

    #[error("price {0} outside [0, 1]")]
    PriceOutOfRange(Decimal),

    #[error("negative trade size {0}")]
    NegativeSize(Decimal),
}

/// A single fill on the CLOB. Fields are private: once constructed a trade
/// cannot be changed, and construction enforces the price and size bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    id: String,
    market_id: String,
    wallet: String,
    side: Side,
    size_usd: Decimal,
    price: Decimal,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    raw: serde_json::Value,
}

impl Trade {
    pub fn new(
        id: impl Into<String>,
        market_id: impl Into<String>,
        wallet: impl Into<String>,
        side: Side,
        size_usd: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, TradeError> {
        let id = id.into();
        let market_id = market_id.into();
        let wallet = wallet.into();

        if id.is_empty() {
            return Err(TradeError::MissingId);
        }
        if market_id.is_empty() {
            return Err(TradeError::MissingMarket);
        }
        if wallet.is_empty() {
            return Err(TradeError::MissingWallet);
        }
        if price < Decimal::ZERO || price > Decimal::ONE {
            return Err(TradeError::PriceOutOfRange(price));
        }
        if size_usd < Decimal::ZERO {
            return Err(TradeError::NegativeSize(size_usd));
        }

        Ok(Self {
            id,
            market_id,
            wallet,
            side,
            size_usd,
            price,
            timestamp,
            raw: serde_json::Value::Null,
        })
    }

    /// Attach the source payload the trade was decoded from.
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn size_usd(&self) -> Decimal {
        self.size_usd
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    /// The YES-outcome probability this trade implies.
    pub fn implied_yes_price(&self) -> Decimal {
        match self.side {
            Side::Yes => self.price,
            Side::No => Decimal::ONE - self.price,
        }
    }
}
