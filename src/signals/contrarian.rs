use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use super::SignalDetector;
use crate::errors::DetectorError;
use crate::models::{Confidence, Market, Side, Signal, SignalType, Trade, WalletProfile};

const BASE: Decimal = Decimal::from_parts(6, 0, 0, false, 1);
const CAP: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
const TRACK_RECORD_BONUS: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
const GOOD_WIN_RATE: Decimal = Decimal::from_parts(6, 0, 0, false, 1);
const MIN_TRACK_RECORD: u32 = 10;

/// Flags bets against a strong consensus: buying NO while YES trades above
/// `high`, or buying YES while it trades below `low`.
#[derive(Debug, Clone)]
pub struct ContrarianDetector {
    low: Decimal,
    high: Decimal,
}

impl ContrarianDetector {
    pub fn new(low: Decimal, high: Decimal) -> Self {
        Self { low, high }
    }
}

#[async_trait]
impl SignalDetector for ContrarianDetector {
    fn name(&self) -> &'static str {
        "Contrarian"
    }

    async fn detect(
        &self,
        trade: &Trade,
        wallet: &WalletProfile,
        market: &Market,
    ) -> Result<Option<Signal>, DetectorError> {
        let yes = market.yes_price;
        let (edge, consensus) = match trade.side() {
            Side::No if yes > self.high => (yes - self.high, Side::Yes),
            Side::Yes if yes < self.low => (self.low - yes, Side::No),
            _ => return Ok(None),
        };

        let proven = wallet.win_rate >= GOOD_WIN_RATE && wallet.total_trades >= MIN_TRACK_RECORD;
        let mut confidence = BASE + edge * Decimal::TWO;
        if proven {
            confidence += TRACK_RECORD_BONUS;
        }

        let consensus_price = match consensus {
            Side::Yes => yes,
            Side::No => market.no_price(),
        };

        let signal = Signal::new(
            SignalType::Contrarian,
            Confidence::capped(confidence, CAP),
            format!(
                "Buying {} against {}% {} consensus",
                trade.side(),
                (consensus_price * Decimal::ONE_HUNDRED).round_dp(0),
                consensus
            ),
        )
        .with_metadata(json!({
            "yes_price": yes,
            "trade_side": trade.side(),
            "edge": edge,
            "wallet_win_rate": wallet.win_rate,
            "proven_wallet": proven,
        }));

        Ok(Some(signal))
    }
}
