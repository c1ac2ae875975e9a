use std::collections::HashSet;

use super::{FilterResult, TradeFilter};
use crate::models::{Market, MarketCategory, Trade};

/// Drops trades on excluded market categories and on markets that have
/// already ended.
#[derive(Debug, Clone)]
pub struct MarketFilter {
    excluded: HashSet<MarketCategory>,
}

impl MarketFilter {
    pub fn new(excluded: HashSet<MarketCategory>) -> Self {
        Self { excluded }
    }

    pub fn add_excluded(&mut self, category: MarketCategory) {
        self.excluded.insert(category);
    }

    pub fn remove_excluded(&mut self, category: MarketCategory) {
        self.excluded.remove(&category);
    }

    pub fn is_excluded(&self, category: MarketCategory) -> bool {
        self.excluded.contains(&category)
    }
}

impl TradeFilter for MarketFilter {
    fn name(&self) -> &'static str {
        "MarketFilter"
    }

    fn check(&mut self, trade: &Trade, market: &Market) -> FilterResult {
        if self.excluded.contains(&market.category) {
            return FilterResult::Reject(format!("market category '{}' is excluded", market.category));
        }

        if !market.is_active_at(trade.timestamp()) {
            return FilterResult::Reject("market is no longer active".into());
        }

        FilterResult::Accept
    }
}
