mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;

use polyscan::config::ScannerConfig;
use polyscan::errors::{PipelineError, SourceError};
use polyscan::filters::{FilterChain, LpFilter, MarketFilter, SizeFilter};
use polyscan::ingestion::{ChannelSource, IterSource, MockTradeGenerator};
use polyscan::models::{MarketCategory, SignalType, TradeError};
use polyscan::services::{InMemoryWallets, StaticMarkets};
use polyscan::signals::{default_detectors, SignalDetector};
use polyscan::sinks::telegram::format_alert;
use polyscan::sinks::{AlertSink, ConsoleSink};

use common::*;

const WALLET: &str = "0x1111111111111111111111111111111111111111";

fn detectors_with(extra: Box<dyn SignalDetector>) -> Vec<Box<dyn SignalDetector>> {
    let mut detectors = default_detectors(&ScannerConfig::default().detectors);
    detectors.push(extra);
    detectors
}

#[tokio::test]
async fn test_fresh_wallet_with_outsized_trade_raises_alert() {
    let mut h = harness([profile(WALLET, 3, 1_000)]);

    let alert = h
        .pipeline
        .process_trade(trade("t1", WALLET, SCIENCE_MARKET, 15_250))
        .await
        .expect("alert");

    let types = alert.signal_types();
    assert_eq!(types, vec![SignalType::FreshWallet, SignalType::SizeAnomaly]);
    assert!(alert.signals()[0].confidence.value() >= Decimal::new(8, 1));
    assert!(alert.confidence().value() >= Decimal::new(65, 2));
    assert_eq!(alert.market().category, MarketCategory::Science);

    h.pipeline.flush().await;
    assert_eq!(h.sink.alerts().len(), 1);
}

#[tokio::test]
async fn test_small_trade_never_reaches_detectors() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = ScannerConfig::default();
    let mut h = build(
        Arc::new(test_markets()),
        Arc::new(InMemoryWallets::default()),
        FilterChain::from_config(&config),
        detectors_with(Box::new(CountingDetector { calls: calls.clone() })),
        Vec::new(),
    );

    let alert = h
        .pipeline
        .process_trade(trade("t1", WALLET, SCIENCE_MARKET, 500))
        .await;

    assert!(alert.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let stats = h.pipeline.stats().snapshot();
    assert_eq!(stats.rejected.get("SizeFilter"), Some(&1));
    assert_eq!(stats.passed_filters, 0);
}

#[tokio::test]
async fn test_market_filter_short_circuits_later_filters() {
    let config = ScannerConfig::default();
    let after_market = Arc::new(AtomicUsize::new(0));
    let filters = FilterChain::new()
        .with(MarketFilter::new(config.filters.excluded_categories.clone()))
        .with(CountingFilter { name: "Probe", seen: after_market.clone() })
        .with(SizeFilter::new(config.filters.min_trade_size_usd))
        .with(LpFilter::new(config.lp.clone()));
    let mut h = build(
        Arc::new(test_markets()),
        Arc::new(InMemoryWallets::default()),
        filters,
        default_detectors(&config.detectors),
        Vec::new(),
    );

    let alert = h
        .pipeline
        .process_trade(trade("t1", WALLET, SPORTS_MARKET, 50_000))
        .await;

    assert!(alert.is_none());
    assert_eq!(after_market.load(Ordering::SeqCst), 0);
    assert_eq!(h.pipeline.stats().snapshot().rejected.get("MarketFilter"), Some(&1));

    // The probe does see trades the market filter lets through
    h.pipeline
        .process_trade(trade("t2", WALLET, SCIENCE_MARKET, 50_000))
        .await;
    assert_eq!(after_market.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_quiet_trade_passes_filters_without_alert() {
    // Seasoned wallet, ordinary size, even odds, weekday afternoon
    let mut h = harness([profile(WALLET, 100, 20_000)]);

    let alert = h
        .pipeline
        .process_trade(trade("t1", WALLET, SCIENCE_MARKET, 5_000))
        .await;

    assert!(alert.is_none());
    let stats = h.pipeline.stats().snapshot();
    assert_eq!(stats.passed_filters, 1);
    assert_eq!(stats.alerts_emitted, 0);
    h.pipeline.flush().await;
    assert!(h.sink.alerts().is_empty());
}

#[tokio::test]
async fn test_unknown_wallet_scores_maximum_fresh_confidence() {
    let mut h = harness([]);

    let alert = h
        .pipeline
        .process_trade(trade("t1", WALLET, SCIENCE_MARKET, 15_250))
        .await
        .expect("alert");

    assert_eq!(alert.wallet().total_trades, 0);
    let fresh = &alert.signals()[0];
    assert_eq!(fresh.signal_type, SignalType::FreshWallet);
    assert_eq!(fresh.confidence.value(), Decimal::new(95, 2));
}

#[tokio::test]
async fn test_failing_sink_does_not_block_others() {
    let config = ScannerConfig::default();
    let failing: Arc<dyn AlertSink> = Arc::new(FailingSink);
    let mut h = build(
        Arc::new(test_markets()),
        Arc::new(InMemoryWallets::default()),
        FilterChain::from_config(&config),
        default_detectors(&config.detectors),
        vec![failing],
    );

    h.pipeline
        .process_trade(trade("t1", WALLET, SCIENCE_MARKET, 15_250))
        .await
        .expect("alert");
    h.pipeline
        .process_trade(trade("t2", "0x2222222222222222222222222222222222222222", SCIENCE_MARKET, 20_000))
        .await
        .expect("alert");
    h.pipeline.flush().await;

    assert_eq!(h.sink.alerts().len(), 2);
    let stats = h.pipeline.stats().snapshot();
    assert_eq!(stats.alerts_emitted, 2);
    assert_eq!(stats.sink_failures, 2);
}

#[tokio::test]
async fn test_panicking_sink_counts_as_delivery_failure() {
    let config = ScannerConfig::default();
    let panicking: Arc<dyn AlertSink> = Arc::new(PanickingSink);
    let mut h = build(
        Arc::new(test_markets()),
        Arc::new(InMemoryWallets::default()),
        FilterChain::from_config(&config),
        default_detectors(&config.detectors),
        vec![panicking],
    );

    h.pipeline
        .process_trade(trade("t1", WALLET, SCIENCE_MARKET, 15_250))
        .await
        .expect("alert");
    h.pipeline.flush().await;

    assert_eq!(h.sink.alerts().len(), 1);
    let stats = h.pipeline.stats().snapshot();
    assert_eq!(stats.alerts_emitted, 1);
    assert_eq!(stats.sink_failures, 1);
}

#[tokio::test]
async fn test_multibyte_wallet_is_logged_and_rendered() {
    // Log fields are only formatted while a subscriber is listening
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let config = ScannerConfig::default();
    let console: Arc<dyn AlertSink> = Arc::new(ConsoleSink::new());
    let mut h = build(
        Arc::new(test_markets()),
        Arc::new(InMemoryWallets::default()),
        FilterChain::from_config(&config),
        default_detectors(&config.detectors),
        vec![console],
    );

    let alert = h
        .pipeline
        .process_trade(trade("t1", "0x€€€€€€€€€€€€", SCIENCE_MARKET, 15_250))
        .await
        .expect("alert");
    h.pipeline.flush().await;

    assert_eq!(h.sink.alerts().len(), 1);
    assert_eq!(h.pipeline.stats().snapshot().sink_failures, 0);
    assert!(format_alert(&alert).contains("0x€€€€...€€€€"));
}

#[tokio::test]
async fn test_panicking_detector_is_isolated() {
    let config = ScannerConfig::default();
    let mut h = build(
        Arc::new(test_markets()),
        Arc::new(InMemoryWallets::default()),
        FilterChain::from_config(&config),
        detectors_with(Box::new(PanickingDetector)),
        Vec::new(),
    );

    let alert = h
        .pipeline
        .process_trade(trade("t1", WALLET, SCIENCE_MARKET, 15_250))
        .await
        .expect("alert");

    assert_eq!(alert.signal_types()[0], SignalType::FreshWallet);
    assert_eq!(h.pipeline.stats().snapshot().detector_failures, 1);
}

#[tokio::test]
async fn test_market_lookup_failure_degrades_to_unknown_market() {
    let config = ScannerConfig::default();
    let mut h = build(
        Arc::new(UnavailableMarkets),
        Arc::new(InMemoryWallets::default()),
        FilterChain::from_config(&config),
        default_detectors(&config.detectors),
        Vec::new(),
    );

    let alert = h
        .pipeline
        .process_trade(trade("t1", WALLET, SCIENCE_MARKET, 15_250))
        .await
        .expect("alert");

    assert_eq!(alert.market().id, SCIENCE_MARKET);
    assert_eq!(alert.market().category, MarketCategory::Other);
}

#[tokio::test]
async fn test_identical_input_yields_identical_signals() {
    let mut first = harness([profile(WALLET, 2, 1_000)]);
    let mut second = harness([profile(WALLET, 2, 1_000)]);
    let t = trade("t1", WALLET, SCIENCE_MARKET, 15_250);

    let a = first.pipeline.process_trade(t.clone()).await.expect("alert");
    let b = second.pipeline.process_trade(t).await.expect("alert");

    assert_eq!(a.signals(), b.signals());
    assert_eq!(a.confidence(), b.confidence());
}

#[tokio::test]
async fn test_run_drops_malformed_items_and_drains_source() {
    let mut h = harness([]);
    let mut source = IterSource::from_results([
        Err(SourceError::Malformed(TradeError::MissingId)),
        Ok(trade("t1", WALLET, SCIENCE_MARKET, 15_250)),
        Err(SourceError::Malformed(TradeError::PriceOutOfRange(Decimal::from(2)))),
        Ok(trade("t2", WALLET, SCIENCE_MARKET, 500)),
    ]);
    let (_tx, rx) = watch::channel(false);

    let stats = h.pipeline.run(&mut source, rx).await.unwrap();

    assert_eq!(stats.malformed_trades, 2);
    assert_eq!(stats.trades_received, 2);
    assert_eq!(stats.alerts_emitted, 1);
    assert_eq!(h.sink.alerts().len(), 1);
}

#[tokio::test]
async fn test_source_disconnect_is_terminal() {
    let mut h = harness([]);
    let mut source = IterSource::from_results([
        Ok(trade("t1", WALLET, SCIENCE_MARKET, 15_250)),
        Err(SourceError::Disconnected("feed gone".into())),
        Ok(trade("t2", WALLET, SCIENCE_MARKET, 15_250)),
    ]);
    let (_tx, rx) = watch::channel(false);

    let err = h.pipeline.run(&mut source, rx).await.unwrap_err();

    assert!(matches!(err, PipelineError::Source(SourceError::Disconnected(_))));
    let stats = h.pipeline.stats().snapshot();
    assert_eq!(stats.trades_received, 1);
    // Dispatches issued before the disconnect are still delivered
    assert_eq!(h.sink.alerts().len(), 1);
}

#[tokio::test]
async fn test_shutdown_stops_pulling_trades() {
    let mut h = harness([]);
    let (feed, mut source) = ChannelSource::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let stats = h.pipeline.stats();

    let driver = async {
        feed.send(Ok(trade("t1", WALLET, SCIENCE_MARKET, 15_250)))
            .await
            .unwrap();
        while stats.snapshot().trades_received < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        stop_tx.send(true).unwrap();
        // Queued after shutdown, never processed
        feed.send(Ok(trade("t2", WALLET, SCIENCE_MARKET, 15_250)))
            .await
            .unwrap();
    };

    let (result, ()) = tokio::join!(h.pipeline.run(&mut source, stop_rx), driver);

    let final_stats = result.unwrap();
    assert_eq!(final_stats.trades_received, 1);
    assert_eq!(h.sink.alerts().len(), 1);
}

#[tokio::test]
async fn test_already_stopped_pipeline_processes_nothing() {
    let mut h = harness([]);
    let mut source = IterSource::new([trade("t1", WALLET, SCIENCE_MARKET, 15_250)]);
    let (_tx, rx) = watch::channel(true);

    let stats = h.pipeline.run(&mut source, rx).await.unwrap();

    assert_eq!(stats.trades_received, 0);
}

#[tokio::test]
async fn test_generated_flow_keeps_confidences_in_unit_range() {
    let mut generator = MockTradeGenerator::seeded(7, 600).without_delay().limit(300);
    let config = ScannerConfig::default();
    let mut h = build(
        Arc::new(StaticMarkets::new(generator.markets().to_vec())),
        Arc::new(InMemoryWallets::new(generator.wallet_profiles())),
        FilterChain::from_config(&config),
        default_detectors(&config.detectors),
        Vec::new(),
    );
    let (_tx, rx) = watch::channel(false);

    let stats = h.pipeline.run(&mut generator, rx).await.unwrap();

    assert_eq!(stats.trades_received, 300);
    assert_eq!(
        stats.trades_received,
        stats.total_rejected() + stats.passed_filters
    );

    let alerts = h.sink.alerts();
    assert!(!alerts.is_empty());
    let mut trade_ids = HashSet::new();
    for alert in &alerts {
        assert!(!alert.signals().is_empty());
        assert!(alert.confidence().value() >= Decimal::new(65, 2));
        assert!(alert.confidence().value() <= Decimal::ONE);
        for signal in alert.signals() {
            assert!(signal.confidence.value() >= Decimal::ZERO);
            assert!(signal.confidence.value() <= Decimal::ONE);
        }
        assert!(trade_ids.insert(alert.trade().id().to_string()));
    }
}
