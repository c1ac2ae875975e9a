use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use crate::errors::ProviderError;
use crate::models::WalletProfile;
use crate::signals::cache_capacity;

/// Historical wallet lookup. `Ok(None)` means the wallet has no history.
#[async_trait]
pub trait WalletDataProvider: Send + Sync {
    async fn get_profile(&self, address: &str) -> Result<Option<WalletProfile>, ProviderError>;
}

struct CachedProfile {
    fetched_at: Instant,
    profile: Option<WalletProfile>,
}

/// TTL + LRU cache in front of another provider. Both hits and "no history"
/// answers are cached until `ttl` elapses; errors are not.
pub struct WalletService {
    inner: Arc<dyn WalletDataProvider>,
    ttl: Duration,
    cache: Mutex<LruCache<String, CachedProfile>>,
}

impl WalletService {
    pub fn new(inner: Arc<dyn WalletDataProvider>, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(LruCache::new(cache_capacity(capacity))),
        }
    }

    fn lookup(&self, address: &str) -> Option<Option<WalletProfile>> {
        let mut cache = self.cache.lock().ok()?;
        match cache.get(address) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.profile.clone()),
            Some(_) => {
                cache.pop(address);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl WalletDataProvider for WalletService {
    async fn get_profile(&self, address: &str) -> Result<Option<WalletProfile>, ProviderError> {
        if let Some(profile) = self.lookup(address) {
            return Ok(profile);
        }

        let profile = self.inner.get_profile(address).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                address.to_string(),
                CachedProfile {
                    fetched_at: Instant::now(),
                    profile: profile.clone(),
                },
            );
        }
        Ok(profile)
    }
}

/// In-memory wallet table.
#[derive(Default)]
pub struct InMemoryWallets {
    profiles: RwLock<HashMap<String, WalletProfile>>,
}

impl InMemoryWallets {
    pub fn new(profiles: impl IntoIterator<Item = WalletProfile>) -> Self {
        Self {
            profiles: RwLock::new(
                profiles
                    .into_iter()
                    .map(|p| (p.address.clone(), p))
                    .collect(),
            ),
        }
    }

    pub fn insert(&self, profile: WalletProfile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.address.clone(), profile);
        }
    }
}

#[async_trait]
impl WalletDataProvider for InMemoryWallets {
    async fn get_profile(&self, address: &str) -> Result<Option<WalletProfile>, ProviderError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| ProviderError::Unavailable("wallet table lock poisoned".into()))?;
        Ok(profiles.get(address).cloned())
    }
}
