use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::FutureExt;
use metrics::counter;
use rust_decimal::Decimal;

use super::wallet_service::WalletDataProvider;
use crate::errors::DetectorError;
use crate::intelligence::{aggregate_confidence, meets_threshold};
use crate::metrics::{DETECTOR_FAILURES, PROVIDER_FAILURES};
use crate::models::{Alert, Confidence, Market, Signal, Trade, WalletProfile};
use crate::signals::SignalDetector;

/// What enrichment made of one trade.
#[derive(Debug)]
pub struct EnrichmentOutcome {
    pub alert: Option<Alert>,
    pub signals: usize,
    pub confidence: Confidence,
    pub detector_failures: usize,
}

/// Runs every detector over a filtered trade and turns the signals into at
/// most one alert.
pub struct EnrichmentService {
    wallets: Arc<dyn WalletDataProvider>,
    detectors: Vec<Box<dyn SignalDetector>>,
    threshold: Decimal,
}

impl EnrichmentService {
    pub fn new(
        wallets: Arc<dyn WalletDataProvider>,
        detectors: Vec<Box<dyn SignalDetector>>,
        threshold: Decimal,
    ) -> Self {
        Self {
            wallets,
            detectors,
            threshold,
        }
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    pub async fn enrich(&self, trade: &Trade, market: &Market) -> Option<Alert> {
        self.evaluate(trade, market).await.alert
    }

    pub async fn evaluate(&self, trade: &Trade, market: &Market) -> EnrichmentOutcome {
        let wallet = self.wallet_profile(trade.wallet()).await;

        let runs = self.detectors.iter().map(|detector| {
            let name = detector.name();
            let fut = detector.detect(trade, &wallet, market);
            async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(DetectorError::Panicked(name)),
                }
            }
        });
        let results = join_all(runs).await;

        let mut signals: Vec<Signal> = Vec::new();
        let mut detector_failures = 0;
        for (detector, result) in self.detectors.iter().zip(results) {
            match result {
                Ok(Some(signal)) => signals.push(signal),
                Ok(None) => {}
                Err(e) => {
                    detector_failures += 1;
                    counter!(DETECTOR_FAILURES, "detector" => detector.name()).increment(1);
                    tracing::warn!(
                        detector = detector.name(),
                        trade_id = %trade.id(),
                        error = %e,
                        "Detector failed, treating as no signal"
                    );
                }
            }
        }

        let confidence = aggregate_confidence(&signals);
        let signal_count = signals.len();

        tracing::debug!(
            trade_id = %trade.id(),
            signals = signal_count,
            confidence = %confidence,
            "Trade enriched"
        );

        let alert = if meets_threshold(confidence, self.threshold) {
            Alert::new(trade.clone(), market.clone(), wallet, signals, confidence)
        } else {
            None
        };

        EnrichmentOutcome {
            alert,
            signals: signal_count,
            confidence,
            detector_failures,
        }
    }

    async fn wallet_profile(&self, address: &str) -> WalletProfile {
        match self.wallets.get_profile(address).await {
            Ok(Some(profile)) => profile,
            Ok(None) => WalletProfile::empty(address),
            Err(e) => {
                counter!(PROVIDER_FAILURES, "provider" => "wallet").increment(1);
                tracing::warn!(wallet = %address, error = %e, "Wallet lookup failed, using empty profile");
                WalletProfile::empty(address)
            }
        }
    }
}
