use futures_util::FutureExt;
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::source::TradeSource;
use crate::errors::{PipelineError, SourceError};
use crate::filters::{FilterChain, FilterDecision};
use crate::metrics::{
    ALERTS_EMITTED, PIPELINE_LATENCY, PROVIDER_FAILURES, SINK_FAILURES, TRADES_RECEIVED,
    TRADES_REJECTED,
};
use crate::models::{short_address, Alert, Market, Trade};
use crate::services::{EnrichmentService, MarketDataProvider};
use crate::sinks::AlertSink;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Running totals for one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub trades_received: u64,
    pub malformed_trades: u64,
    /// Rejections keyed by filter name.
    pub rejected: BTreeMap<String, u64>,
    pub passed_filters: u64,
    pub alerts_emitted: u64,
    pub detector_failures: u64,
    pub sink_failures: u64,
}

impl PipelineStats {
    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }
}

/// Shared, lock-protected [`PipelineStats`]. Readers take snapshots.
#[derive(Debug, Default)]
pub struct StatsHandle {
    inner: Mutex<PipelineStats>,
}

impl StatsHandle {
    pub fn snapshot(&self) -> PipelineStats {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut PipelineStats)) {
        if let Ok(mut stats) = self.inner.lock() {
            f(&mut stats);
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Drives trades through market lookup, the filter chain, enrichment and
/// alert dispatch.
///
/// Trades are processed one at a time: a trade has been dispatched to every
/// sink before the next one reaches the filters. Sink delivery itself runs
/// on background tasks so a slow sink does not hold up the loop.
pub struct Pipeline {
    markets: Arc<dyn MarketDataProvider>,
    filters: FilterChain,
    enrichment: EnrichmentService,
    sinks: Vec<Arc<dyn AlertSink>>,
    stats: Arc<StatsHandle>,
    dispatches: JoinSet<()>,
}

impl Pipeline {
    pub fn new(
        markets: Arc<dyn MarketDataProvider>,
        filters: FilterChain,
        enrichment: EnrichmentService,
        sinks: Vec<Arc<dyn AlertSink>>,
    ) -> Self {
        Self {
            markets,
            filters,
            enrichment,
            sinks,
            stats: Arc::new(StatsHandle::default()),
            dispatches: JoinSet::new(),
        }
    }

    pub fn stats(&self) -> Arc<StatsHandle> {
        Arc::clone(&self.stats)
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Run one trade through the pipeline. Returns the alert if one was
    /// raised; delivery to sinks may still be in flight.
    pub async fn process_trade(&mut self, trade: Trade) -> Option<Arc<Alert>> {
        let start = Instant::now();
        counter!(TRADES_RECEIVED).increment(1);
        self.stats.update(|s| s.trades_received += 1);

        let market = self.market_for(&trade).await;

        if let FilterDecision::Rejected { filter, reason } = self.filters.evaluate(&trade, &market) {
            counter!(TRADES_REJECTED, "filter" => filter).increment(1);
            self.stats
                .update(|s| *s.rejected.entry(filter.to_string()).or_default() += 1);
            tracing::debug!(
                trade_id = %trade.id(),
                filter,
                reason = %reason,
                "Trade filtered"
            );
            histogram!(PIPELINE_LATENCY).record(start.elapsed().as_secs_f64());
            return None;
        }

        self.stats.update(|s| s.passed_filters += 1);
        tracing::debug!(
            trade_id = %trade.id(),
            wallet = %short_address(trade.wallet()),
            size = %trade.size_usd(),
            "Trade passed filters"
        );

        let outcome = self.enrichment.evaluate(&trade, &market).await;
        if outcome.detector_failures > 0 {
            self.stats
                .update(|s| s.detector_failures += outcome.detector_failures as u64);
        }

        let alert = outcome.alert.map(Arc::new);
        if let Some(alert) = &alert {
            counter!(ALERTS_EMITTED).increment(1);
            self.stats.update(|s| s.alerts_emitted += 1);
            tracing::info!(
                trade_id = %trade.id(),
                wallet = %short_address(trade.wallet()),
                market = %market.id,
                signals = alert.signals().len(),
                confidence = %alert.confidence(),
                "Alert raised"
            );
            self.dispatch(alert);
        }

        histogram!(PIPELINE_LATENCY).record(start.elapsed().as_secs_f64());
        alert
    }

    /// Pull trades from `source` until it is exhausted, disconnects, or
    /// `shutdown` becomes true. A trade already pulled is always finished.
    /// In-flight sink deliveries are drained before returning.
    pub async fn run<S>(
        &mut self,
        source: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PipelineStats, PipelineError>
    where
        S: TradeSource + ?Sized,
    {
        tracing::info!(
            filters = ?self.filters.names(),
            detectors = ?self.enrichment.detector_names(),
            sinks = ?self.sink_names(),
            threshold = %self.enrichment.threshold(),
            "Pipeline started"
        );

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let next = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break Ok(());
                    }
                    continue;
                }
                next = source.next_trade() => next,
            };

            match next {
                None => {
                    tracing::info!("Trade source exhausted");
                    break Ok(());
                }
                Some(Ok(trade)) => {
                    self.process_trade(trade).await;
                }
                Some(Err(SourceError::Malformed(e))) => {
                    self.stats.update(|s| s.malformed_trades += 1);
                    tracing::debug!(error = %e, "Dropping malformed trade");
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Trade source failed");
                    break Err(PipelineError::Source(e));
                }
            }

            self.reap_dispatches();
        };

        self.flush().await;
        let stats = self.stats.snapshot();
        tracing::info!(
            trades_received = stats.trades_received,
            rejected = stats.total_rejected(),
            passed_filters = stats.passed_filters,
            alerts = stats.alerts_emitted,
            detector_failures = stats.detector_failures,
            sink_failures = stats.sink_failures,
            "Pipeline stopped"
        );

        result.map(|()| stats)
    }

    /// Wait for every in-flight sink delivery.
    pub async fn flush(&mut self) {
        while let Some(joined) = self.dispatches.join_next().await {
            log_join_error(joined);
        }
    }

    async fn market_for(&self, trade: &Trade) -> Market {
        match self.markets.get_market(trade.market_id()).await {
            Ok(Some(market)) => market,
            Ok(None) => {
                tracing::debug!(market = %trade.market_id(), "Unknown market, using defaults");
                Market::unknown(trade.market_id())
            }
            Err(e) => {
                counter!(PROVIDER_FAILURES, "provider" => "market").increment(1);
                tracing::warn!(market = %trade.market_id(), error = %e, "Market lookup failed, using defaults");
                Market::unknown(trade.market_id())
            }
        }
    }

    fn dispatch(&mut self, alert: &Arc<Alert>) {
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let alert = Arc::clone(alert);
            let stats = Arc::clone(&self.stats);
            self.dispatches.spawn(async move {
                let error = match AssertUnwindSafe(sink.send(&alert)).catch_unwind().await {
                    Ok(Ok(())) => return,
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => "sink panicked".to_string(),
                };
                counter!(SINK_FAILURES, "sink" => sink.name()).increment(1);
                stats.update(|s| s.sink_failures += 1);
                tracing::warn!(
                    sink = sink.name(),
                    trade_id = %alert.trade().id(),
                    error = %error,
                    "Alert delivery failed"
                );
            });
        }
    }

    fn reap_dispatches(&mut self) {
        while let Some(joined) = self.dispatches.try_join_next() {
            log_join_error(joined);
        }
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Alert delivery task did not complete");
    }
}
