use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use super::SignalDetector;
use crate::errors::DetectorError;
use crate::models::{Confidence, Market, Signal, SignalType, Trade, WalletProfile};

/// Flags wallets with fewer than `threshold` historical trades. A wallet the
/// data provider knows nothing about arrives here as zero trades and scores
/// the highest.
#[derive(Debug, Clone)]
pub struct FreshWalletDetector {
    threshold: u32,
}

impl FreshWalletDetector {
    const MAX_CONFIDENCE: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
    const MIN_CONFIDENCE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
    const STEP: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// `0.95 - 0.05 * trades`, never below 0.5.
    fn confidence(total_trades: u32) -> Confidence {
        let raw = Self::MAX_CONFIDENCE - Self::STEP * Decimal::from(total_trades);
        Confidence::new(raw.max(Self::MIN_CONFIDENCE))
    }
}

#[async_trait]
impl SignalDetector for FreshWalletDetector {
    fn name(&self) -> &'static str {
        "FreshWallet"
    }

    async fn detect(
        &self,
        trade: &Trade,
        wallet: &WalletProfile,
        _market: &Market,
    ) -> Result<Option<Signal>, DetectorError> {
        if !wallet.is_fresh(self.threshold) {
            return Ok(None);
        }

        let description = if wallet.total_trades == 0 {
            "No previous trades, likely a new wallet".to_string()
        } else {
            format!("Wallet has only {} previous trades", wallet.total_trades)
        };

        let signal = Signal::new(
            SignalType::FreshWallet,
            Self::confidence(wallet.total_trades),
            description,
        )
        .with_metadata(json!({
            "wallet": trade.wallet(),
            "total_trades": wallet.total_trades,
            "days_active": wallet.days_active(trade.timestamp()),
        }));

        Ok(Some(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_support::{market, trade, wallet};

    async fn detect(total_trades: u32) -> Option<Signal> {
        FreshWalletDetector::new(5)
            .detect(&trade(10_000), &wallet(total_trades, 1_000), &market())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fires_below_threshold() {
        let signal = detect(3).await.expect("3 trades is fresh");
        assert_eq!(signal.signal_type, SignalType::FreshWallet);
        assert_eq!(signal.confidence.value(), Decimal::new(80, 2));
    }

    #[tokio::test]
    async fn test_silent_at_threshold() {
        assert!(detect(5).await.is_none());
        assert!(detect(50).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_wallet_scores_highest() {
        let signal = FreshWalletDetector::new(5)
            .detect(&trade(10_000), &WalletProfile::empty("0xwallet"), &market())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.confidence.value(), Decimal::new(95, 2));
        for n in 1..5 {
            let other = detect(n).await.unwrap();
            assert!(other.confidence < signal.confidence);
        }
    }

    #[test]
    fn test_confidence_floor() {
        assert_eq!(FreshWalletDetector::confidence(40).value(), Decimal::new(5, 1));
    }
}
