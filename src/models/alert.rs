use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Confidence, Market, Signal, SignalType, Trade, WalletProfile};

/// A scored finding handed to the sinks. Never constructed without signals.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    trade: Trade,
    market: Market,
    wallet: WalletProfile,
    signals: Vec<Signal>,
    confidence: Confidence,
    created_at: DateTime<Utc>,
}

impl Alert {
    /// Returns `None` when `signals` is empty.
    pub fn new(
        trade: Trade,
        market: Market,
        wallet: WalletProfile,
        signals: Vec<Signal>,
        confidence: Confidence,
    ) -> Option<Self> {
        if signals.is_empty() {
            return None;
        }

        Some(Self {
            trade,
            market,
            wallet,
            signals,
            confidence,
            created_at: Utc::now(),
        })
    }

    pub fn trade(&self) -> &Trade {
        &self.trade
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn wallet(&self) -> &WalletProfile {
        &self.wallet
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn signal_types(&self) -> Vec<SignalType> {
        self.signals.iter().map(|s| s.signal_type).collect()
    }

    /// Market YES odds as known before the trade.
    pub fn odds_before(&self) -> Decimal {
        self.market.yes_price
    }

    /// YES odds implied by the trade itself.
    pub fn odds_after(&self) -> Decimal {
        self.trade.implied_yes_price()
    }
}
