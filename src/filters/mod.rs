//! Cheap predicates that drop uninteresting trades before enrichment.
//!
//! Filters run in registration order and the chain stops at the first
//! rejection, so later filters never observe a trade an earlier one dropped.
//! Rejection is a normal outcome, not an error.

pub mod lp_filter;
pub mod market_filter;
pub mod size_filter;

pub use lp_filter::LpFilter;
pub use market_filter::MarketFilter;
pub use size_filter::SizeFilter;

use crate::config::ScannerConfig;
use crate::models::{Market, Trade};

/// Outcome of a single filter check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    Accept,
    Reject(String),
}

impl FilterResult {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterResult::Accept)
    }
}

/// Outcome of the whole chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accepted,
    Rejected {
        filter: &'static str,
        reason: String,
    },
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterDecision::Accepted)
    }
}

/// A trade predicate. `check` takes `&mut self` so stateful filters can keep
/// history without locks; the chain is owned by the single pipeline task.
pub trait TradeFilter: Send {
    fn name(&self) -> &'static str;

    fn check(&mut self, trade: &Trade, market: &Market) -> FilterResult;
}

#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn TradeFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Market, size, then LP: categorical checks first, the stateful one last.
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new()
            .with(MarketFilter::new(config.filters.excluded_categories.clone()))
            .with(SizeFilter::new(config.filters.min_trade_size_usd))
            .with(LpFilter::new(config.lp.clone()))
    }

    pub fn with(mut self, filter: impl TradeFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn TradeFilter>) {
        self.filters.push(filter);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn accepts(&mut self, trade: &Trade, market: &Market) -> bool {
        self.evaluate(trade, market).is_accepted()
    }

    pub fn evaluate(&mut self, trade: &Trade, market: &Market) -> FilterDecision {
        for filter in self.filters.iter_mut() {
            if let FilterResult::Reject(reason) = filter.check(trade, market) {
                return FilterDecision::Rejected {
                    filter: filter.name(),
                    reason,
                };
            }
        }
        FilterDecision::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketCategory, Side};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        accept: bool,
    }

    impl TradeFilter for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        fn check(&mut self, _trade: &Trade, _market: &Market) -> FilterResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.accept {
                FilterResult::Accept
            } else {
                FilterResult::Reject("nope".into())
            }
        }
    }

    fn trade(size: i64) -> Trade {
        Trade::new(
            "t1",
            "m1",
            "0xabc",
            Side::Yes,
            Decimal::from(size),
            Decimal::new(5, 1),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_short_circuits_on_first_rejection() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut chain = FilterChain::new()
            .with(Counting { name: "first", calls: first.clone(), accept: false })
            .with(Counting { name: "second", calls: second.clone(), accept: true });

        let decision = chain.evaluate(&trade(10_000), &Market::unknown("m1"));

        assert_eq!(
            decision,
            FilterDecision::Rejected { filter: "first", reason: "nope".into() }
        );
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_chain_accepts() {
        let mut chain = FilterChain::new();
        assert!(chain.accepts(&trade(1), &Market::unknown("m1")));
    }

    #[test]
    fn test_default_chain_order() {
        let chain = FilterChain::from_config(&ScannerConfig::default());
        assert_eq!(chain.names(), vec!["MarketFilter", "SizeFilter", "LpFilter"]);
    }

    #[test]
    fn test_default_chain_rejects_sports_before_size() {
        let mut chain = FilterChain::from_config(&ScannerConfig::default());
        let market = Market {
            category: MarketCategory::Sports,
            ..Market::unknown("m1")
        };
        match chain.evaluate(&trade(50_000), &market) {
            FilterDecision::Rejected { filter, .. } => assert_eq!(filter, "MarketFilter"),
            FilterDecision::Accepted => panic!("sports trade should be rejected"),
        }
    }
}
