use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use rust_decimal::Decimal;
use serde_json::json;

use super::{cache_capacity, chrono_duration, poisoned, SignalDetector};
use crate::errors::DetectorError;
use crate::models::{Confidence, Market, Side, Signal, SignalType, Trade, WalletProfile};

const BASE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
const CAP: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
const PER_WALLET: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
const TIGHTNESS_WEIGHT: Decimal = Decimal::from_parts(2, 0, 0, false, 1);
const MAX_ENTRIES_PER_MARKET: usize = 512;

#[derive(Debug, Clone)]
struct RecentEntry {
    trade_id: String,
    wallet: String,
    side: Side,
    at: DateTime<Utc>,
}

/// Flags coordinated entry: at least `min_wallets` distinct wallets buying
/// the same side of one market within `window`.
///
/// Confidence grows with every wallet past the minimum and with how tightly
/// the trades are bunched inside the window.
pub struct ClusteringDetector {
    window: Duration,
    min_wallets: usize,
    recent: Mutex<LruCache<String, VecDeque<RecentEntry>>>,
}

impl ClusteringDetector {
    pub fn new(window: Duration, min_wallets: usize, max_tracked_markets: usize) -> Self {
        Self {
            window,
            min_wallets,
            recent: Mutex::new(LruCache::new(cache_capacity(max_tracked_markets))),
        }
    }

    /// Records the trade and returns the same-side wallets and timestamps in
    /// the trailing window `[at - window, at]`. Later trades that already
    /// arrived do not count toward an out-of-order one.
    fn cluster(&self, trade: &Trade) -> Result<Vec<(String, DateTime<Utc>)>, DetectorError> {
        let window = chrono_duration(self.window);
        let mut recent = self.recent.lock().map_err(|_| poisoned(self.name()))?;
        let entries = recent.get_or_insert_mut(trade.market_id().to_string(), VecDeque::new);

        if !entries.iter().any(|e| e.trade_id == trade.id()) {
            entries.push_back(RecentEntry {
                trade_id: trade.id().to_string(),
                wallet: trade.wallet().to_string(),
                side: trade.side(),
                at: trade.timestamp(),
            });
        }

        let newest = entries.iter().map(|e| e.at).max().unwrap_or(trade.timestamp());
        entries.retain(|e| e.at >= newest - window);
        while entries.len() > MAX_ENTRIES_PER_MARKET {
            entries.pop_front();
        }

        let at = trade.timestamp();
        Ok(entries
            .iter()
            .filter(|e| e.side == trade.side())
            .filter(|e| e.at <= at && e.at >= at - window)
            .map(|e| (e.wallet.clone(), e.at))
            .collect())
    }
}

#[async_trait]
impl SignalDetector for ClusteringDetector {
    fn name(&self) -> &'static str {
        "Clustering"
    }

    async fn detect(
        &self,
        trade: &Trade,
        _wallet: &WalletProfile,
        _market: &Market,
    ) -> Result<Option<Signal>, DetectorError> {
        let cluster = self.cluster(trade)?;

        let wallets: HashSet<&str> = cluster.iter().map(|(w, _)| w.as_str()).collect();
        let unique = wallets.len();
        if unique < self.min_wallets {
            return Ok(None);
        }

        let (first, last) = cluster.iter().fold((trade.timestamp(), trade.timestamp()), |(lo, hi), (_, at)| {
            (lo.min(*at), hi.max(*at))
        });
        let span = (last - first).num_seconds().max(0);
        let window_secs = self.window.as_secs().max(1) as i64;
        let tightness = Decimal::ONE - Decimal::from(span.min(window_secs)) / Decimal::from(window_secs);

        let extra_wallets = Decimal::from((unique - self.min_wallets + 1) as i64);
        let confidence = BASE + PER_WALLET * extra_wallets + TIGHTNESS_WEIGHT * tightness;

        let signal = Signal::new(
            SignalType::Clustering,
            Confidence::capped(confidence, CAP),
            format!(
                "{} wallets bought {} within {}s",
                unique,
                trade.side(),
                span
            ),
        )
        .with_metadata(json!({
            "unique_wallets": unique,
            "cluster_trades": cluster.len(),
            "span_secs": span,
            "window_secs": window_secs,
            "tightness": tightness.round_dp(4),
        }));

        Ok(Some(signal))
    }
}
