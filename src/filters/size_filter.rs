use rust_decimal::Decimal;

use super::{FilterResult, TradeFilter};
use crate::models::{Market, Trade};

/// Drops trades strictly below the minimum USD size.
#[derive(Debug, Clone)]
pub struct SizeFilter {
    min_size_usd: Decimal,
}

impl SizeFilter {
    pub fn new(min_size_usd: Decimal) -> Self {
        Self { min_size_usd }
    }

    pub fn set_minimum(&mut self, min_size_usd: Decimal) {
        self.min_size_usd = min_size_usd;
    }
}

impl TradeFilter for SizeFilter {
    fn name(&self) -> &'static str {
        "SizeFilter"
    }

    fn check(&mut self, trade: &Trade, _market: &Market) -> FilterResult {
        if trade.size_usd() < self.min_size_usd {
            return FilterResult::Reject(format!(
                "size ${} below minimum ${}",
                trade.size_usd().round_dp(2),
                self.min_size_usd.round_dp(2)
            ));
        }
        FilterResult::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::Utc;

    fn trade(size: Decimal) -> Trade {
        Trade::new("t1", "m1", "0xabc", Side::No, size, Decimal::new(5, 1), Utc::now()).unwrap()
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let mut filter = SizeFilter::new(Decimal::from(2_000));
        let market = Market::unknown("m1");

        assert!(filter.check(&trade(Decimal::from(2_000)), &market).is_accept());
        assert!(!filter.check(&trade(Decimal::new(199_999, 2)), &market).is_accept());
    }

    #[test]
    fn test_small_trade_rejected() {
        let mut filter = SizeFilter::new(Decimal::from(2_000));
        assert_eq!(
            filter.check(&trade(Decimal::from(500)), &Market::unknown("m1")),
            FilterResult::Reject("size $500 below minimum $2000".into())
        );
    }

    #[test]
    fn test_set_minimum() {
        let mut filter = SizeFilter::new(Decimal::from(2_000));
        filter.set_minimum(Decimal::from(100));
        assert!(filter.check(&trade(Decimal::from(500)), &Market::unknown("m1")).is_accept());
    }
}
