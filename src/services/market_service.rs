use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use lru::LruCache;

use crate::errors::ProviderError;
use crate::models::Market;
use crate::signals::cache_capacity;

/// Market metadata lookup. `Ok(None)` means the market is unknown.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_market(&self, market_id: &str) -> Result<Option<Market>, ProviderError>;
}

/// LRU cache in front of another provider. Only found markets are cached;
/// misses and errors hit the inner provider again next time.
pub struct MarketService {
    inner: Arc<dyn MarketDataProvider>,
    cache: Mutex<LruCache<String, Market>>,
}

impl MarketService {
    pub fn new(inner: Arc<dyn MarketDataProvider>, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(cache_capacity(capacity))),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Drop a cached market, e.g. after its odds are known to have moved.
    pub fn invalidate(&self, market_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(market_id);
        }
    }
}

#[async_trait]
impl MarketDataProvider for MarketService {
    async fn get_market(&self, market_id: &str) -> Result<Option<Market>, ProviderError> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(market) = cache.get(market_id) {
                return Ok(Some(market.clone()));
            }
        }

        let market = self.inner.get_market(market_id).await?;
        if let Some(m) = &market {
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(market_id.to_string(), m.clone());
            }
        }
        Ok(market)
    }
}

/// Fixed in-memory market table.
#[derive(Default)]
pub struct StaticMarkets {
    markets: RwLock<HashMap<String, Market>>,
}

impl StaticMarkets {
    pub fn new(markets: impl IntoIterator<Item = Market>) -> Self {
        Self {
            markets: RwLock::new(markets.into_iter().map(|m| (m.id.clone(), m)).collect()),
        }
    }

    pub fn insert(&self, market: Market) {
        if let Ok(mut markets) = self.markets.write() {
            markets.insert(market.id.clone(), market);
        }
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarkets {
    async fn get_market(&self, market_id: &str) -> Result<Option<Market>, ProviderError> {
        let markets = self
            .markets
            .read()
            .map_err(|_| ProviderError::Unavailable("market table lock poisoned".into()))?;
        Ok(markets.get(market_id).cloned())
    }
}
