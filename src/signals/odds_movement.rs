use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use rust_decimal::Decimal;
use serde_json::json;

use super::{cache_capacity, chrono_duration, poisoned, SignalDetector};
use crate::errors::DetectorError;
use crate::models::{Confidence, Market, Signal, SignalType, Trade, WalletProfile};

const BASE: Decimal = Decimal::from_parts(6, 0, 0, false, 1);
const CAP: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
const MAX_IMPACT: Decimal = Decimal::from_parts(2, 0, 0, false, 1);
const MAX_SNAPSHOTS_PER_MARKET: usize = 256;

#[derive(Debug, Clone)]
struct PriceSnapshot {
    trade_id: String,
    at: DateTime<Utc>,
    yes_price: Decimal,
}

/// Flags trades that move the implied YES price by at least `min_move`
/// relative to where the market stood `lookback` ago.
///
/// The reference price is the oldest snapshot inside the lookback window
/// taken from a different trade, falling back to the market's quoted price.
/// Each trade id is recorded once, so replaying a trade does not shift the
/// reference.
pub struct OddsMovementDetector {
    min_move: Decimal,
    lookback: Duration,
    history: Mutex<LruCache<String, VecDeque<PriceSnapshot>>>,
}

impl OddsMovementDetector {
    pub fn new(min_move: Decimal, lookback: Duration, max_tracked_markets: usize) -> Self {
        Self {
            min_move,
            lookback,
            history: Mutex::new(LruCache::new(cache_capacity(max_tracked_markets))),
        }
    }

    /// Records the trade's price and returns the reference price it is
    /// measured against. Returns `None` when no earlier snapshot exists.
    fn record(&self, trade: &Trade) -> Result<Option<Decimal>, DetectorError> {
        let mut history = self.history.lock().map_err(|_| poisoned(self.name()))?;
        let snapshots = history.get_or_insert_mut(trade.market_id().to_string(), VecDeque::new);

        let cutoff = trade.timestamp() - chrono_duration(self.lookback);
        snapshots.retain(|s| s.at >= cutoff);

        let reference = snapshots
            .iter()
            .find(|s| s.trade_id != trade.id() && s.at <= trade.timestamp())
            .map(|s| s.yes_price);

        if !snapshots.iter().any(|s| s.trade_id == trade.id()) {
            snapshots.push_back(PriceSnapshot {
                trade_id: trade.id().to_string(),
                at: trade.timestamp(),
                yes_price: trade.implied_yes_price(),
            });
            while snapshots.len() > MAX_SNAPSHOTS_PER_MARKET {
                snapshots.pop_front();
            }
        }

        Ok(reference)
    }
}

#[async_trait]
impl SignalDetector for OddsMovementDetector {
    fn name(&self) -> &'static str {
        "OddsMovement"
    }

    async fn detect(
        &self,
        trade: &Trade,
        _wallet: &WalletProfile,
        market: &Market,
    ) -> Result<Option<Signal>, DetectorError> {
        let before = self.record(trade)?.unwrap_or(market.yes_price);
        let after = trade.implied_yes_price();
        let delta = (after - before).abs();

        if delta < self.min_move {
            return Ok(None);
        }

        let impact = if market.liquidity > Decimal::ZERO {
            (trade.size_usd() / market.liquidity).min(MAX_IMPACT)
        } else {
            Decimal::ZERO
        };
        let confidence = Confidence::capped(BASE + delta * Decimal::TWO + impact, CAP);
        let direction = if after > before { "up" } else { "down" };

        let signal = Signal::new(
            SignalType::OddsMovement,
            confidence,
            format!(
                "YES odds moved {} {} points ({} -> {})",
                direction,
                (delta * Decimal::ONE_HUNDRED).round_dp(1),
                before.round_dp(3),
                after.round_dp(3)
            ),
        )
        .with_metadata(json!({
            "odds_before": before,
            "odds_after": after,
            "delta": delta,
            "market_impact": impact.round_dp(4),
        }));

        Ok(Some(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use crate::signals::test_support::{market, trade_at, wallet, weekday_afternoon};

    fn detector() -> OddsMovementDetector {
        OddsMovementDetector::new(Decimal::new(5, 2), Duration::from_secs(300), 100)
    }

    fn priced(id: &str, price: Decimal, seconds_after: i64) -> Trade {
        let at = weekday_afternoon() + chrono::Duration::seconds(seconds_after);
        trade_at(id, "0xw", Side::Yes, 10_000, price, at)
    }

    #[tokio::test]
    async fn test_first_trade_measured_against_market_price() {
        let d = detector();
        // market quotes 0.50, trade at 0.58
        let signal = d
            .detect(&priced("t1", Decimal::new(58, 2), 0), &wallet(20, 5_000), &market())
            .await
            .unwrap()
            .expect("8 point move");
        // 0.6 + 2 * 0.08 + 10k / 1M
        assert_eq!(signal.confidence.value(), Decimal::new(77, 2));
        assert_eq!(signal.metadata["odds_before"], json!(Decimal::new(5, 1)));
    }

    #[tokio::test]
    async fn test_small_move_is_silent() {
        let d = detector();
        let result = d
            .detect(&priced("t1", Decimal::new(52, 2), 0), &wallet(20, 5_000), &market())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_uses_earlier_trade_as_reference() {
        let d = detector();
        let quoted_high = Market {
            yes_price: Decimal::new(70, 2),
            ..market()
        };
        d.detect(&priced("t1", Decimal::new(40, 2), 0), &wallet(20, 5_000), &quoted_high)
            .await
            .unwrap();

        let signal = d
            .detect(&priced("t2", Decimal::new(48, 2), 60), &wallet(20, 5_000), &quoted_high)
            .await
            .unwrap()
            .expect("moved from 0.40 to 0.48");
        assert_eq!(signal.metadata["odds_before"], json!(Decimal::new(40, 2)));
    }

    #[tokio::test]
    async fn test_reference_expires_after_lookback() {
        let d = detector();
        d.detect(&priced("t1", Decimal::new(30, 2), 0), &wallet(20, 5_000), &market())
            .await
            .unwrap();

        // ten minutes later the 0.30 snapshot is gone; 0.52 vs quoted 0.50
        let result = d
            .detect(&priced("t2", Decimal::new(52, 2), 600), &wallet(20, 5_000), &market())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_replaying_a_trade_gives_the_same_signal() {
        let d = detector();
        let trade = priced("t1", Decimal::new(60, 2), 0);
        let first = d.detect(&trade, &wallet(20, 5_000), &market()).await.unwrap();
        let second = d.detect(&trade, &wallet(20, 5_000), &market()).await.unwrap();
        assert_eq!(first, second);
    }
}
