use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use polyscan::config::ScannerConfig;
use polyscan::errors::{DetectorError, ProviderError, SinkError};
use polyscan::filters::{FilterChain, FilterResult, TradeFilter};
use polyscan::ingestion::Pipeline;
use polyscan::models::{Alert, Market, MarketCategory, Side, Signal, Trade, WalletProfile};
use polyscan::services::{
    EnrichmentService, InMemoryWallets, MarketDataProvider, StaticMarkets, WalletDataProvider,
};
use polyscan::signals::{default_detectors, SignalDetector};
use polyscan::sinks::AlertSink;

pub const SCIENCE_MARKET: &str = "market_science";
pub const SPORTS_MARKET: &str = "market_sports";

/// Wednesday 15:00 UTC: outside the default off-peak hours and not a weekend.
#[allow(dead_code)]
pub fn weekday_afternoon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 15, 0, 0).unwrap()
}

/// A market at even odds with deep liquidity and no end date, so only the
/// wallet and trade size can make a detector fire.
#[allow(dead_code)]
pub fn market(id: &str, category: MarketCategory) -> Market {
    Market {
        id: id.into(),
        question: format!("Test market {id}"),
        category,
        end_date: None,
        yes_price: Decimal::new(5, 1),
        liquidity: Decimal::from(10_000_000),
        volume_24h: Decimal::from(250_000),
    }
}

#[allow(dead_code)]
pub fn test_markets() -> StaticMarkets {
    StaticMarkets::new([
        market(SCIENCE_MARKET, MarketCategory::Science),
        market(SPORTS_MARKET, MarketCategory::Sports),
    ])
}

#[allow(dead_code)]
pub fn trade(id: &str, wallet: &str, market_id: &str, size_usd: i64) -> Trade {
    Trade::new(
        id,
        market_id,
        wallet,
        Side::Yes,
        Decimal::from(size_usd),
        Decimal::new(5, 1),
        weekday_afternoon(),
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn profile(address: &str, total_trades: u32, avg_trade_size: i64) -> WalletProfile {
    WalletProfile {
        total_trades,
        total_volume_usd: Decimal::from(avg_trade_size) * Decimal::from(total_trades),
        avg_trade_size: Decimal::from(avg_trade_size),
        ..WalletProfile::empty(address)
    }
}

// ---------------------------------------------------------------------------
// Pipeline assembly
// ---------------------------------------------------------------------------

pub struct Harness {
    pub pipeline: Pipeline,
    pub sink: Arc<RecordingSink>,
}

/// Default filters and detectors over the test markets and `wallets`, with a
/// single recording sink.
#[allow(dead_code)]
pub fn harness(wallets: impl IntoIterator<Item = WalletProfile>) -> Harness {
    let config = ScannerConfig::default();
    let detectors = default_detectors(&config.detectors);
    build(
        Arc::new(test_markets()),
        Arc::new(InMemoryWallets::new(wallets)),
        FilterChain::from_config(&config),
        detectors,
        Vec::new(),
    )
}

/// Assemble a pipeline whose first sink records alerts, followed by
/// `extra_sinks`.
#[allow(dead_code)]
pub fn build(
    markets: Arc<dyn MarketDataProvider>,
    wallets: Arc<dyn WalletDataProvider>,
    filters: FilterChain,
    detectors: Vec<Box<dyn SignalDetector>>,
    extra_sinks: Vec<Arc<dyn AlertSink>>,
) -> Harness {
    let config = ScannerConfig::default();
    let sink = Arc::new(RecordingSink::default());
    let mut sinks: Vec<Arc<dyn AlertSink>> = vec![sink.clone()];
    sinks.extend(extra_sinks);

    let enrichment = EnrichmentService::new(wallets, detectors, config.alert_confidence_threshold);
    Harness {
        pipeline: Pipeline::new(markets, filters, enrichment, sinks),
        sink,
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingSink {
    #[allow(dead_code)]
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

pub struct FailingSink;

#[async_trait]
impl AlertSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send(&self, _alert: &Alert) -> Result<(), SinkError> {
        Err(SinkError::Rejected("always fails".into()))
    }
}

/// Passes every trade and counts how many it saw.
pub struct CountingFilter {
    pub name: &'static str,
    pub seen: Arc<AtomicUsize>,
}

impl TradeFilter for CountingFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn check(&mut self, _trade: &Trade, _market: &Market) -> FilterResult {
        self.seen.fetch_add(1, Ordering::SeqCst);
        FilterResult::Accept
    }
}

/// Never fires; counts invocations.
pub struct CountingDetector {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SignalDetector for CountingDetector {
    fn name(&self) -> &'static str {
        "Counting"
    }

    async fn detect(
        &self,
        _trade: &Trade,
        _wallet: &WalletProfile,
        _market: &Market,
    ) -> Result<Option<Signal>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

pub struct PanickingDetector;

#[async_trait]
impl SignalDetector for PanickingDetector {
    fn name(&self) -> &'static str {
        "Panicking"
    }

    async fn detect(
        &self,
        _trade: &Trade,
        _wallet: &WalletProfile,
        _market: &Market,
    ) -> Result<Option<Signal>, DetectorError> {
        panic!("detector bug");
    }
}

pub struct UnavailableMarkets;

#[async_trait]
impl MarketDataProvider for UnavailableMarkets {
    async fn get_market(&self, _market_id: &str) -> Result<Option<Market>, ProviderError> {
        Err(ProviderError::Unavailable("market API down".into()))
    }
}

pub struct PanickingSink;

#[async_trait]
impl AlertSink for PanickingSink {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn send(&self, _alert: &Alert) -> Result<(), SinkError> {
        panic!("sink bug");
    }
}
