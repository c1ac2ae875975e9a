//! Heuristic signal detectors.
//!
//! Each detector is independent: it sees the trade, the wallet profile and
//! the market, and returns at most one signal. Detectors never read each
//! other's output and any cache they keep is private to them.

pub mod clustering;
pub mod contrarian;
pub mod fresh_wallet;
pub mod odds_movement;
pub mod size_anomaly;
pub mod timing;

pub use clustering::ClusteringDetector;
pub use contrarian::ContrarianDetector;
pub use fresh_wallet::FreshWalletDetector;
pub use odds_movement::OddsMovementDetector;
pub use size_anomaly::SizeAnomalyDetector;
pub use timing::TimingDetector;

use async_trait::async_trait;
use std::num::NonZeroUsize;

use crate::config::DetectorConfig;
use crate::errors::DetectorError;
use crate::models::{Market, Signal, Trade, WalletProfile};

#[async_trait]
pub trait SignalDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means nothing notable, which is the common case.
    async fn detect(
        &self,
        trade: &Trade,
        wallet: &WalletProfile,
        market: &Market,
    ) -> Result<Option<Signal>, DetectorError>;
}

/// The standard detector set, in the order their signals are reported.
pub fn default_detectors(config: &DetectorConfig) -> Vec<Box<dyn SignalDetector>> {
    vec![
        Box::new(FreshWalletDetector::new(config.fresh_wallet_trade_threshold)),
        Box::new(SizeAnomalyDetector::new(
            config.size_anomaly_multiplier,
            config.liquidity_share,
            config.large_trade_usd,
        )),
        Box::new(TimingDetector::new(
            config.off_peak_hours.iter().copied(),
            config.resolution_window,
        )),
        Box::new(OddsMovementDetector::new(
            config.odds_min_move,
            config.odds_lookback,
            config.max_tracked_markets,
        )),
        Box::new(ContrarianDetector::new(config.contrarian_low, config.contrarian_high)),
        Box::new(ClusteringDetector::new(
            config.clustering_window,
            config.clustering_min_wallets,
            config.max_tracked_markets,
        )),
    ]
}

pub(crate) fn chrono_duration(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

pub(crate) fn cache_capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

pub(crate) fn poisoned(detector: &'static str) -> DetectorError {
    DetectorError::Failed {
        detector,
        message: "state lock poisoned".into(),
    }
}
