use rust_decimal::Decimal;

use crate::models::{Confidence, Signal};

/// Combine independent signal confidences into one score:
/// `1 - Π(1 - cᵢ)`.
///
/// No signals scores zero. The result never drops when a signal is added,
/// never falls below the strongest single signal, and does not depend on
/// signal order.
pub fn aggregate_confidence(signals: &[Signal]) -> Confidence {
    if signals.is_empty() {
        return Confidence::ZERO;
    }

    let miss = signals
        .iter()
        .map(|s| Decimal::ONE - s.confidence.value())
        .fold(Decimal::ONE, |acc, m| acc * m);

    Confidence::new((Decimal::ONE - miss).round_dp(6))
}

/// True if `confidence` reaches the alert threshold.
pub fn meets_threshold(confidence: Confidence, threshold: Decimal) -> bool {
    confidence.value() >= threshold
}
