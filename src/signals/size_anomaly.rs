use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use super::SignalDetector;
use crate::errors::DetectorError;
use crate::models::{Confidence, Market, Signal, SignalType, Trade, WalletProfile};

const CAP: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
const TEN: Decimal = Decimal::TEN;

/// Flags trades that are large for the wallet that placed them, or large
/// for the market they hit.
///
/// Checks, first match wins:
/// 1. size ≥ `multiplier` × wallet average trade size
/// 2. size ≥ `liquidity_share` of market liquidity
/// 3. wallet has no history and size ≥ `large_trade_usd`
#[derive(Debug, Clone)]
pub struct SizeAnomalyDetector {
    multiplier: Decimal,
    liquidity_share: Decimal,
    large_trade_usd: Decimal,
}

impl SizeAnomalyDetector {
    pub fn new(multiplier: Decimal, liquidity_share: Decimal, large_trade_usd: Decimal) -> Self {
        Self {
            multiplier,
            liquidity_share,
            large_trade_usd,
        }
    }
}

#[async_trait]
impl SignalDetector for SizeAnomalyDetector {
    fn name(&self) -> &'static str {
        "SizeAnomaly"
    }

    async fn detect(
        &self,
        trade: &Trade,
        wallet: &WalletProfile,
        market: &Market,
    ) -> Result<Option<Signal>, DetectorError> {
        let size = trade.size_usd();

        if wallet.has_history() {
            let ratio = size / wallet.avg_trade_size;
            if ratio >= self.multiplier {
                let signal = Signal::new(
                    SignalType::SizeAnomaly,
                    Confidence::capped(Decimal::new(5, 1) + ratio / TEN, CAP),
                    format!(
                        "Trade is {}x the wallet average (${})",
                        ratio.round_dp(1),
                        wallet.avg_trade_size.round_dp(2)
                    ),
                )
                .with_metadata(json!({
                    "trade_size": size,
                    "avg_trade_size": wallet.avg_trade_size,
                    "size_ratio": ratio.round_dp(4),
                }));
                return Ok(Some(signal));
            }
        }

        if market.liquidity > Decimal::ZERO {
            let share = size / market.liquidity;
            if share >= self.liquidity_share {
                let signal = Signal::new(
                    SignalType::SizeAnomaly,
                    Confidence::capped(Decimal::new(6, 1) + share, CAP),
                    format!(
                        "Trade is {}% of market liquidity",
                        (share * Decimal::ONE_HUNDRED).round_dp(1)
                    ),
                )
                .with_metadata(json!({
                    "trade_size": size,
                    "market_liquidity": market.liquidity,
                    "liquidity_share": share.round_dp(4),
                }));
                return Ok(Some(signal));
            }
        }

        if !wallet.has_history() && self.large_trade_usd > Decimal::ZERO && size >= self.large_trade_usd {
            let multiples = size / self.large_trade_usd;
            let signal = Signal::new(
                SignalType::SizeAnomaly,
                Confidence::capped(Decimal::new(6, 1) + multiples / TEN, CAP),
                format!("Large trade from a wallet with no history: ${}", size.round_dp(2)),
            )
            .with_metadata(json!({
                "trade_size": size,
                "large_trade_usd": self.large_trade_usd,
            }));
            return Ok(Some(signal));
        }

        Ok(None)
    }
}
