use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A score in [0, 1]. Every constructor clamps, so an out-of-range value can
/// never reach a signal or an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(Decimal);

impl Confidence {
    pub const ZERO: Confidence = Confidence(Decimal::ZERO);
    pub const ONE: Confidence = Confidence(Decimal::ONE);

    pub fn new(value: Decimal) -> Self {
        Self(value.clamp(Decimal::ZERO, Decimal::ONE))
    }

    /// Clamp into `[0, cap]`, `cap` itself being clamped into [0, 1].
    pub fn capped(value: Decimal, cap: Decimal) -> Self {
        let cap = cap.clamp(Decimal::ZERO, Decimal::ONE);
        Self(value.clamp(Decimal::ZERO, cap))
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl From<Decimal> for Confidence {
    fn from(value: Decimal) -> Self {
        Confidence::new(value)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).round_dp(0))
    }
}

/// Heuristic that produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    FreshWallet,
    SizeAnomaly,
    Timing,
    OddsMovement,
    Contrarian,
    Clustering,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::FreshWallet => "FreshWallet",
            SignalType::SizeAnomaly => "SizeAnomaly",
            SignalType::Timing => "Timing",
            SignalType::OddsMovement => "OddsMovement",
            SignalType::Contrarian => "Contrarian",
            SignalType::Clustering => "Clustering",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detector's finding on one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub confidence: Confidence,
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Signal {
    pub fn new(signal_type: SignalType, confidence: Confidence, description: impl Into<String>) -> Self {
        Self {
            signal_type,
            confidence,
            description: description.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
