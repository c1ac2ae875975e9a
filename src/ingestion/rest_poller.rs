use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

use crate::errors::SourceError;
use crate::metrics::PROVIDER_FAILURES;
use crate::models::{Side, Trade, TradeError};
use crate::polymarket::types::ApiTrade;
use crate::polymarket::DataClient;

const SEEN_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RestPollerConfig {
    pub interval: Duration,
    /// Fills requested per poll.
    pub batch_limit: u32,
    /// Consecutive failed polls before the feed is declared disconnected.
    /// `None` polls forever.
    pub max_consecutive_failures: Option<u32>,
}

/// Polls the Data API for recent fills and forwards the ones it has not
/// seen yet. Remembers the last `SEEN_CAPACITY` fill ids.
pub struct RestPoller {
    client: DataClient,
    config: RestPollerConfig,
    seen: LruCache<String, ()>,
}

impl RestPoller {
    pub fn new(client: DataClient, config: RestPollerConfig) -> Self {
        Self {
            client,
            config,
            seen: LruCache::new(NonZeroUsize::new(SEEN_CAPACITY).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Unseen fills from one poll, oldest first. Fills without an id or
    /// with no size are dropped; fills failing validation come back as
    /// `Malformed` so the coordinator can count them.
    pub fn fresh_trades(&mut self, mut batch: Vec<ApiTrade>) -> Vec<Result<Trade, SourceError>> {
        batch.sort_by_key(ApiTrade::timestamp);

        let mut fresh = Vec::new();
        for api in &batch {
            let Some(id) = fill_id(api) else {
                tracing::debug!(wallet = ?api.proxy_wallet, "Dropping polled trade without an id");
                continue;
            };
            if self.seen.put(id, ()).is_some() {
                continue;
            }
            match convert_api_trade(api) {
                Ok(Some(trade)) if trade.size_usd().is_zero() => {
                    tracing::trace!(trade_id = %trade.id(), "Skipping zero-size fill");
                }
                Ok(Some(trade)) => fresh.push(Ok(trade)),
                Ok(None) => tracing::debug!(?api, "Dropping polled trade with missing fields"),
                Err(e) => fresh.push(Err(SourceError::Malformed(e))),
            }
        }
        fresh
    }

    /// Poll until `shutdown` flips, the receiver is dropped or the failure
    /// budget runs out. The last case sends `SourceError::Disconnected`.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<Result<Trade, SourceError>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            batch_limit = self.config.batch_limit,
            "REST trade poller started"
        );
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return;
            }

            let polled = tokio::select! {
                polled = self.client.get_recent_trades(self.config.batch_limit) => polled,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                    continue;
                }
            };

            match polled {
                Ok(batch) => {
                    failures = 0;
                    let fetched = batch.len();
                    let fresh = self.fresh_trades(batch);
                    tracing::debug!(fetched, new = fresh.len(), "Polled recent trades");
                    for item in fresh {
                        if tx.send(item).await.is_err() {
                            tracing::info!("Trade receiver dropped, stopping poller");
                            return;
                        }
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    counter!(PROVIDER_FAILURES, "provider" => "trades").increment(1);
                    tracing::warn!(error = %e, failures, "Trade poll failed");

                    if self.config.max_consecutive_failures.is_some_and(|max| failures > max) {
                        tracing::error!(failures, "Poll failure budget exhausted");
                        let _ = tx
                            .send(Err(SourceError::Disconnected(format!(
                                "trade poll failed {failures} times in a row: {e}"
                            ))))
                            .await;
                        return;
                    }
                }
            }

            tokio::select! {
                _ = sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

/// Spawnable entry point, mirroring the WebSocket listener.
pub async fn run_rest_poller(
    client: DataClient,
    config: RestPollerConfig,
    tx: mpsc::Sender<Result<Trade, SourceError>>,
    shutdown: watch::Receiver<bool>,
) {
    RestPoller::new(client, config).run(tx, shutdown).await
}

/// One transaction can settle several fills, so the id also carries the
/// wallet and outcome token.
fn fill_id(api: &ApiTrade) -> Option<String> {
    let wallet = api.proxy_wallet.as_deref()?;
    let asset = api.asset.as_deref().unwrap_or_default();
    match api.transaction_hash.as_deref() {
        Some(tx) => Some(format!("{tx}:{wallet}:{asset}")),
        None => {
            let market = api.condition_id.as_deref()?;
            let at = api.timestamp()?.timestamp();
            let shares = api.size.unwrap_or_default();
            Some(format!("{market}:{wallet}:{asset}:{at}:{shares}"))
        }
    }
}

/// Buying an outcome token takes that side at `price`. Selling it is
/// treated as taking the other side at `1 - price`. Unknown outcome names
/// fall back to YES.
///
/// `Ok(None)` when required fields are missing, `Err` when present fields
/// fail trade validation.
pub fn convert_api_trade(api: &ApiTrade) -> Result<Option<Trade>, TradeError> {
    let Some(id) = fill_id(api) else {
        return Ok(None);
    };
    let Some(wallet) = api.proxy_wallet.as_deref() else {
        return Ok(None);
    };
    let Some(market_id) = api.condition_id.as_deref().or(api.asset.as_deref()) else {
        return Ok(None);
    };
    let selling = match api.side.as_deref().map(str::to_ascii_uppercase).as_deref() {
        Some("BUY") => false,
        Some("SELL") => true,
        _ => return Ok(None),
    };

    let token = match api.outcome_index {
        Some(0) => Side::Yes,
        Some(1) => Side::No,
        _ => api
            .outcome
            .as_deref()
            .and_then(Side::from_api_str)
            .unwrap_or(Side::Yes),
    };
    let quoted = api.price.unwrap_or(Decimal::new(5, 1));
    let (side, price) = if selling {
        (token.opposite(), Decimal::ONE - quoted)
    } else {
        (token, quoted)
    };

    let shares = api.size.unwrap_or_default();
    let timestamp = api.timestamp().unwrap_or_else(chrono::Utc::now);

    Trade::new(id, market_id, wallet, side, shares * price, price, timestamp)
        .map(|t| Some(t.with_raw(serde_json::to_value(api).unwrap_or_default())))
}
