use std::collections::VecDeque;
use std::num::NonZeroUsize;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use rust_decimal::Decimal;

use super::{FilterResult, TradeFilter};
use crate::config::LpConfig;
use crate::models::{Market, Side, Trade};

#[derive(Debug, Clone)]
struct RecentTrade {
    at: DateTime<Utc>,
    side: Side,
    size: Decimal,
}

/// Rolling per-wallet trade window.
#[derive(Debug, Default)]
struct WalletHistory {
    trades: VecDeque<RecentTrade>,
}

impl WalletHistory {
    fn record(&mut self, trade: &Trade, max_trades: usize, max_age: Duration) {
        self.trades.push_back(RecentTrade {
            at: trade.timestamp(),
            side: trade.side(),
            size: trade.size_usd(),
        });

        let cutoff = trade.timestamp() - max_age;
        self.trades.retain(|t| t.at >= cutoff);
        while self.trades.len() > max_trades {
            self.trades.pop_front();
        }
    }

    /// 0 when YES and NO volume are equal, 1 when entirely one-sided.
    fn balance_ratio(&self) -> Decimal {
        let (yes, no) = self.trades.iter().fold((Decimal::ZERO, Decimal::ZERO), |(y, n), t| {
            match t.side {
                Side::Yes => (y + t.size, n),
                Side::No => (y, n + t.size),
            }
        });
        let total = yes + no;
        if total.is_zero() {
            return Decimal::ONE;
        }
        ((yes / total) - Decimal::new(5, 1)).abs() * Decimal::TWO
    }

    /// Share of consecutive trade pairs that flip side.
    fn alternation(&self) -> Decimal {
        if self.trades.len() < 2 {
            return Decimal::ZERO;
        }
        let flips = self
            .trades
            .iter()
            .zip(self.trades.iter().skip(1))
            .filter(|(a, b)| a.side != b.side)
            .count();
        Decimal::from(flips as i64) / Decimal::from((self.trades.len() - 1) as i64)
    }

    /// Squared coefficient of variation of trade sizes.
    fn size_cv_squared(&self) -> Decimal {
        let n = Decimal::from(self.trades.len() as i64);
        if n.is_zero() {
            return Decimal::ZERO;
        }
        let mean = self.trades.iter().map(|t| t.size).sum::<Decimal>() / n;
        if mean.is_zero() {
            return Decimal::ZERO;
        }
        let variance = self
            .trades
            .iter()
            .map(|t| {
                let diff = t.size - mean;
                diff * diff
            })
            .sum::<Decimal>()
            / n;
        variance / (mean * mean)
    }
}

/// Drops trades from wallets that look like market makers: frequent,
/// balanced or side-alternating, similarly sized trades.
///
/// This is the only filter with cross-trade state. History is bounded per
/// wallet and the wallet set is an LRU, so memory stays flat on a live feed.
pub struct LpFilter {
    config: LpConfig,
    history: LruCache<String, WalletHistory>,
}

impl LpFilter {
    pub fn new(config: LpConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_tracked_wallets).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            history: LruCache::new(capacity),
        }
    }

    pub fn tracked_wallets(&self) -> usize {
        self.history.len()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn max_age(&self) -> Duration {
        Duration::from_std(self.config.window).unwrap_or_else(|_| Duration::days(1))
    }
}

impl TradeFilter for LpFilter {
    fn name(&self) -> &'static str {
        "LpFilter"
    }

    fn check(&mut self, trade: &Trade, _market: &Market) -> FilterResult {
        let max_trades = self.config.window_trades;
        let max_age = self.max_age();
        let history = self
            .history
            .get_or_insert_mut(trade.wallet().to_string(), WalletHistory::default);
        history.record(trade, max_trades, max_age);

        if history.trades.len() < self.config.min_trades {
            return FilterResult::Accept;
        }

        let cv_limit = self.config.max_size_cv * self.config.max_size_cv;
        if history.size_cv_squared() > cv_limit {
            return FilterResult::Accept;
        }

        let balance = history.balance_ratio();
        if balance < self.config.balance_threshold {
            return FilterResult::Reject(format!(
                "balanced exposure over {} trades (ratio {})",
                history.trades.len(),
                balance.round_dp(2)
            ));
        }

        let alternation = history.alternation();
        if alternation >= self.config.alternation_ratio {
            return FilterResult::Reject(format!(
                "alternating sides over {} trades ({}% flips)",
                history.trades.len(),
                (alternation * Decimal::ONE_HUNDRED).round_dp(0)
            ));
        }

        FilterResult::Accept
    }
}
