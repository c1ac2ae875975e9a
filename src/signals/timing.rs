use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Timelike, Weekday};
use rust_decimal::Decimal;
use serde_json::json;

use super::{chrono_duration, SignalDetector};
use crate::errors::DetectorError;
use crate::models::{Confidence, Market, Signal, SignalType, Trade, WalletProfile};

const BASE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
const CAP: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
const OFF_PEAK_WEIGHT: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
const WEEKEND_WEIGHT: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
const NEAR_RESOLUTION_WEIGHT: Decimal = Decimal::from_parts(2, 0, 0, false, 1);
const IMMINENT_RESOLUTION_WEIGHT: Decimal = Decimal::from_parts(3, 0, 0, false, 1);

/// Flags trades placed off-peak, at weekends, or shortly before the market
/// resolves. Window weights add up on a 0.5 base.
#[derive(Debug, Clone)]
pub struct TimingDetector {
    off_peak_hours: HashSet<u32>,
    resolution_window: Duration,
}

impl TimingDetector {
    pub fn new(off_peak_hours: impl IntoIterator<Item = u32>, resolution_window: Duration) -> Self {
        Self {
            off_peak_hours: off_peak_hours.into_iter().collect(),
            resolution_window,
        }
    }
}

#[async_trait]
impl SignalDetector for TimingDetector {
    fn name(&self) -> &'static str {
        "Timing"
    }

    async fn detect(
        &self,
        trade: &Trade,
        _wallet: &WalletProfile,
        market: &Market,
    ) -> Result<Option<Signal>, DetectorError> {
        let at = trade.timestamp();
        let mut factors: Vec<String> = Vec::new();
        let mut confidence = BASE;

        if self.off_peak_hours.contains(&at.hour()) {
            factors.push("off-peak hours".into());
            confidence += OFF_PEAK_WEIGHT;
        }

        if matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
            factors.push("weekend trading".into());
            confidence += WEEKEND_WEIGHT;
        }

        if let Some(end) = market.end_date {
            let remaining = end - at;
            if remaining > chrono::Duration::zero() {
                if remaining <= chrono::Duration::hours(1) {
                    factors.push("within 1h of resolution".into());
                    confidence += IMMINENT_RESOLUTION_WEIGHT;
                } else if remaining <= chrono_duration(self.resolution_window) {
                    factors.push(format!(
                        "within {}h of resolution",
                        self.resolution_window.as_secs() / 3600
                    ));
                    confidence += NEAR_RESOLUTION_WEIGHT;
                }
            }
        }

        if factors.is_empty() {
            return Ok(None);
        }

        let signal = Signal::new(
            SignalType::Timing,
            Confidence::capped(confidence, CAP),
            format!("Timing factors: {}", factors.join(", ")),
        )
        .with_metadata(json!({
            "hour_utc": at.hour(),
            "day_of_week": at.weekday().to_string(),
            "factors": factors,
        }));

        Ok(Some(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use crate::signals::test_support::{market, trade_at, wallet, weekday_afternoon};
    use chrono::{DateTime, TimeZone, Utc};

    fn detector() -> TimingDetector {
        TimingDetector::new(0..6, Duration::from_secs(24 * 3600))
    }

    async fn detect_at(at: DateTime<Utc>, market: &Market) -> Option<Signal> {
        let trade = trade_at("t1", "0xw", Side::Yes, 5_000, Decimal::new(5, 1), at);
        detector().detect(&trade, &wallet(20, 5_000), market).await.unwrap()
    }

    #[tokio::test]
    async fn test_silent_on_weekday_afternoon() {
        assert!(detect_at(weekday_afternoon(), &market()).await.is_none());
    }

    #[tokio::test]
    async fn test_off_peak() {
        let night = Utc.with_ymd_and_hms(2026, 3, 11, 3, 30, 0).unwrap();
        let signal = detect_at(night, &market()).await.unwrap();
        assert_eq!(signal.confidence.value(), Decimal::new(6, 1));
    }

    #[tokio::test]
    async fn test_weekend_night() {
        // Saturday
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 2, 0, 0).unwrap();
        let signal = detect_at(at, &market()).await.unwrap();
        assert_eq!(signal.confidence.value(), Decimal::new(7, 1));
        assert!(signal.description.contains("weekend"));
    }

    #[tokio::test]
    async fn test_resolution_windows() {
        let at = weekday_afternoon();

        let tomorrow = Market {
            end_date: Some(at + chrono::Duration::hours(20)),
            ..market()
        };
        let signal = detect_at(at, &tomorrow).await.unwrap();
        assert_eq!(signal.confidence.value(), Decimal::new(7, 1));

        let imminent = Market {
            end_date: Some(at + chrono::Duration::minutes(30)),
            ..market()
        };
        let signal = detect_at(at, &imminent).await.unwrap();
        assert_eq!(signal.confidence.value(), Decimal::new(8, 1));
        assert!(signal.description.contains("1h"));

        let far = Market {
            end_date: Some(at + chrono::Duration::days(30)),
            ..market()
        };
        assert!(detect_at(at, &far).await.is_none());
    }

    #[tokio::test]
    async fn test_confidence_is_capped() {
        // Sunday 01:00, resolving in 10 minutes: 0.5 + 0.1 + 0.1 + 0.3 = 1.0
        let at = Utc.with_ymd_and_hms(2026, 3, 15, 1, 0, 0).unwrap();
        let imminent = Market {
            end_date: Some(at + chrono::Duration::minutes(10)),
            ..market()
        };
        let signal = detect_at(at, &imminent).await.unwrap();
        assert_eq!(signal.confidence.value(), Decimal::new(95, 2));
    }
}
