use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rand::prelude::*;
use rust_decimal::Decimal;

use super::source::TradeSource;
use crate::errors::SourceError;
use crate::models::{Market, MarketCategory, Side, Trade, WalletProfile};

const SAMPLE_QUESTIONS: &[&str] = &[
    "Will AI surpass human-level reasoning by 2030?",
    "Will the Fed cut rates in Q1 2027?",
    "Will there be a major cyber attack on US infrastructure?",
    "Will renewable energy exceed 50% of US power generation?",
    "Will a new pandemic emerge requiring lockdowns?",
    "Will inflation drop below 2% in 2027?",
    "Will Democrats win the 2028 presidential election?",
    "Will Tesla stock exceed $500 by end of 2027?",
    "Will there be a government shutdown in 2027?",
    "Will autonomous vehicles be approved for widespread use?",
];

const REGULAR_WALLETS: &[&str] = &[
    "0x742d35Cc6634C0532925a3b844Bc9e7595f8fE10",
    "0x8ba1f109551bD432803012645Ac136ddd64DBa72",
    "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B",
    "0x1234567890abcdef1234567890abcdef12345678",
    "0xDEADBEEF0000000000000000000000000000CAFE",
];

const FRESH_WALLETS: &[&str] = &[
    "0xF7e5000000000000000000000000000000000001",
    "0xF7e5000000000000000000000000000000000002",
];

const WHALE_WALLET: &str = "0x3a1e000000000000000000000000000000000001";

/// Generates plausible trades for running without a live feed.
///
/// Markets are fixed at construction so a [`StaticMarkets`](crate::services::StaticMarkets)
/// table can be seeded from [`MockTradeGenerator::markets`]. Most trades are
/// small; roughly one in ten is large and one in five comes from a fresh or
/// whale wallet.
pub struct MockTradeGenerator {
    rng: StdRng,
    markets: Vec<Market>,
    interval: Duration,
    remaining: Option<usize>,
    large_trade_probability: f64,
}

impl MockTradeGenerator {
    pub fn new(trades_per_minute: u32) -> Self {
        Self::with_rng(StdRng::from_entropy(), trades_per_minute)
    }

    pub fn seeded(seed: u64, trades_per_minute: u32) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), trades_per_minute)
    }

    fn with_rng(mut rng: StdRng, trades_per_minute: u32) -> Self {
        let categories = [
            MarketCategory::Politics,
            MarketCategory::Economics,
            MarketCategory::Science,
            MarketCategory::Entertainment,
            MarketCategory::Other,
        ];

        let markets = SAMPLE_QUESTIONS
            .iter()
            .map(|question| {
                let id = uuid::Uuid::new_v4().simple().to_string();
                Market {
                    id: format!("market_{}", &id[..8]),
                    question: question.to_string(),
                    category: categories[rng.gen_range(0..categories.len())],
                    end_date: Some(Utc::now() + ChronoDuration::days(rng.gen_range(1..90))),
                    yes_price: Decimal::new(rng.gen_range(20i64..=80), 2),
                    liquidity: Decimal::from(rng.gen_range(50_000i64..=300_000)),
                    volume_24h: Decimal::from(rng.gen_range(10_000i64..=500_000)),
                }
            })
            .collect();

        let per_minute = trades_per_minute.max(1);
        Self {
            rng,
            markets,
            interval: Duration::from_secs(60) / per_minute,
            remaining: None,
            large_trade_probability: 0.1,
        }
    }

    /// Emit trades back to back instead of pacing them.
    pub fn without_delay(mut self) -> Self {
        self.interval = Duration::ZERO;
        self
    }

    /// Stop after `n` trades.
    pub fn limit(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    pub fn markets(&self) -> &[Market] {
        &self.markets
    }

    /// Profiles for the wallets this generator trades from.
    pub fn wallet_profiles(&self) -> Vec<WalletProfile> {
        let regular = REGULAR_WALLETS.iter().enumerate().map(|(i, address)| WalletProfile {
            total_trades: 20 + 15 * i as u32,
            total_volume_usd: Decimal::from(60_000 + 25_000 * i as i64),
            win_rate: Decimal::new(45 + 3 * i as i64, 2),
            avg_trade_size: Decimal::from(2_500 + 500 * i as i64),
            first_seen: Some(Utc::now() - ChronoDuration::days(400)),
            last_seen: Some(Utc::now()),
            ..WalletProfile::empty(address)
        });
        let whale = WalletProfile {
            total_trades: 320,
            total_volume_usd: Decimal::from(6_400_000),
            win_rate: Decimal::new(68, 2),
            avg_trade_size: Decimal::from(20_000),
            first_seen: Some(Utc::now() - ChronoDuration::days(900)),
            last_seen: Some(Utc::now()),
            ..WalletProfile::empty(WHALE_WALLET)
        };
        // fresh wallets are left unknown to the provider
        regular.chain(std::iter::once(whale)).collect()
    }

    fn generate(&mut self) -> Result<Trade, SourceError> {
        let market = &self.markets[self.rng.gen_range(0..self.markets.len())];

        let size = if self.rng.gen_bool(self.large_trade_probability) {
            self.rng.gen_range(5_000i64..=50_000)
        } else {
            self.rng.gen_range(100i64..=5_000)
        };

        let wallet = if self.rng.gen_bool(0.2) {
            let special = [FRESH_WALLETS[0], FRESH_WALLETS[1], WHALE_WALLET];
            special[self.rng.gen_range(0..special.len())]
        } else {
            REGULAR_WALLETS[self.rng.gen_range(0..REGULAR_WALLETS.len())]
        };

        let yes_probability = f64::try_from(market.yes_price).unwrap_or(0.5);
        let (side, price) = if self.rng.gen_bool(yes_probability) {
            (Side::Yes, market.yes_price)
        } else {
            (Side::No, market.no_price())
        };

        let id = uuid::Uuid::new_v4().simple().to_string();
        let trade = Trade::new(
            format!("trade_{}", &id[..12]),
            market.id.clone(),
            wallet,
            side,
            Decimal::from(size),
            price,
            Utc::now(),
        )?;
        Ok(trade)
    }
}

#[async_trait]
impl TradeSource for MockTradeGenerator {
    async fn next_trade(&mut self) -> Option<Result<Trade, SourceError>> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        if !self.interval.is_zero() {
            let jitter: f64 = self.rng.gen_range(0.5..1.5);
            tokio::time::sleep(self.interval.mul_f64(jitter)).await;
        }

        Some(self.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_generates_valid_trades_on_known_markets() {
        let mut source = MockTradeGenerator::seeded(7, 60).without_delay().limit(50);
        let market_ids: HashSet<String> = source.markets().iter().map(|m| m.id.clone()).collect();

        let mut count = 0;
        while let Some(item) = source.next_trade().await {
            let trade = item.unwrap();
            assert!(market_ids.contains(trade.market_id()));
            assert!(trade.size_usd() >= Decimal::from(100));
            assert!(trade.price() >= Decimal::ZERO && trade.price() <= Decimal::ONE);
            count += 1;
        }
        assert_eq!(count, 50);
    }

    #[test]
    fn test_markets_avoid_excluded_categories() {
        let source = MockTradeGenerator::seeded(1, 60);
        assert_eq!(source.markets().len(), SAMPLE_QUESTIONS.len());
        assert!(source
            .markets()
            .iter()
            .all(|m| !matches!(m.category, MarketCategory::Sports | MarketCategory::Crypto)));
    }

    #[test]
    fn test_fresh_wallets_have_no_profile() {
        let profiles = MockTradeGenerator::seeded(1, 60).wallet_profiles();
        assert!(profiles.iter().all(|p| !FRESH_WALLETS.contains(&p.address.as_str())));
        assert!(profiles.iter().any(|p| p.address == WHALE_WALLET));
    }
}
