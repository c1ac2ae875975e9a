use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Historical view of a wallet, provided by the wallet-data collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletProfile {
    pub address: String,
    pub total_trades: u32,
    pub total_volume_usd: Decimal,
    /// Share of resolved trades that won, in [0, 1].
    pub win_rate: Decimal,
    pub avg_trade_size: Decimal,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub is_suspected_lp: bool,
}

impl WalletProfile {
    /// Profile for a wallet with no recorded history.
    pub fn empty(address: &str) -> Self {
        Self {
            address: address.to_string(),
            total_trades: 0,
            total_volume_usd: Decimal::ZERO,
            win_rate: Decimal::new(5, 1),
            avg_trade_size: Decimal::ZERO,
            first_seen: None,
            last_seen: None,
            is_suspected_lp: false,
        }
    }

    pub fn is_fresh(&self, threshold: u32) -> bool {
        self.total_trades < threshold
    }

    pub fn has_history(&self) -> bool {
        self.total_trades > 0 && self.avg_trade_size > Decimal::ZERO
    }

    /// Days since the wallet was first seen, zero when unknown.
    pub fn days_active(&self, now: DateTime<Utc>) -> i64 {
        self.first_seen
            .map(|first| (now - first).num_days().max(0))
            .unwrap_or(0)
    }
}
