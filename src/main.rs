use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};

use polyscan::api::create_router;
use polyscan::api::ws_types::WsMessage;
use polyscan::config::{ScannerConfig, SourceKind};
use polyscan::filters::FilterChain;
use polyscan::ingestion::{
    run_rest_poller, run_ws_listener, ChannelSource, MockTradeGenerator, Pipeline,
    RestPollerConfig, StatsHandle, TradeSource, WsListenerConfig,
};
use polyscan::polymarket::{DataClient, GammaClient};
use polyscan::services::{
    EnrichmentService, InMemoryWallets, MarketDataProvider, MarketService, StaticMarkets,
    WalletDataProvider, WalletService,
};
use polyscan::signals::default_detectors;
use polyscan::sinks::{AlertSink, BroadcastSink, ConsoleSink, TelegramSink};
use polyscan::AppState;

const MARKET_CACHE_CAPACITY: usize = 2_048;
const WALLET_CACHE_CAPACITY: usize = 10_000;
const WALLET_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
const FEED_BUFFER: usize = 1_000;
const SUBSCRIBE_MARKET_LIMIT: u32 = 100;
const POLL_BATCH_LIMIT: u32 = 100;
const STATS_INTERVAL: Duration = Duration::from_secs(10);
const SERVER_DRAIN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let metrics_handle = polyscan::metrics::init_metrics()?;
    let config = ScannerConfig::from_env()?;

    // Install rustls crypto provider before any TLS connection
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let (ws_tx, _) = broadcast::channel::<WsMessage>(256);

    // --- Trade source and data providers ---
    let (mut source, markets, wallets): (
        Box<dyn TradeSource>,
        Arc<dyn MarketDataProvider>,
        Arc<dyn WalletDataProvider>,
    ) = match config.source {
        SourceKind::Mock => {
            let generator = MockTradeGenerator::new(config.mock_trades_per_minute);
            let markets: Arc<dyn MarketDataProvider> =
                Arc::new(StaticMarkets::new(generator.markets().to_vec()));
            let wallets: Arc<dyn WalletDataProvider> =
                Arc::new(InMemoryWallets::new(generator.wallet_profiles()));
            tracing::info!(
                trades_per_minute = config.mock_trades_per_minute,
                "Using mock trade source"
            );
            (Box::new(generator) as Box<dyn TradeSource>, markets, wallets)
        }
        SourceKind::WebSocket => {
            let gamma = Arc::new(GammaClient::new());
            let asset_ids = if config.ws_asset_ids.is_empty() {
                let ids = gamma.active_token_ids(SUBSCRIBE_MARKET_LIMIT).await?;
                tracing::info!(count = ids.len(), "Subscribing to active market tokens");
                ids
            } else {
                config.ws_asset_ids.clone()
            };
            if asset_ids.is_empty() {
                anyhow::bail!("no asset ids to subscribe to");
            }

            let (feed_tx, channel_source) = ChannelSource::channel(FEED_BUFFER);
            let listener_config = WsListenerConfig {
                url: config.ws_url.clone(),
                asset_ids,
                max_reconnect_attempts: config.ws_max_reconnect_attempts,
            };
            tokio::spawn(run_ws_listener(listener_config, feed_tx, shutdown_rx.clone()));

            let markets: Arc<dyn MarketDataProvider> =
                Arc::new(MarketService::new(gamma, MARKET_CACHE_CAPACITY));
            let wallets: Arc<dyn WalletDataProvider> = Arc::new(WalletService::new(
                Arc::new(DataClient::new(reqwest::Client::new())),
                WALLET_CACHE_CAPACITY,
                WALLET_CACHE_TTL,
            ));
            (Box::new(channel_source) as Box<dyn TradeSource>, markets, wallets)
        }
        SourceKind::Rest => {
            let data = DataClient::new(reqwest::Client::new());
            let (feed_tx, channel_source) = ChannelSource::channel(FEED_BUFFER);
            let poller_config = RestPollerConfig {
                interval: config.rest_poll_interval,
                batch_limit: POLL_BATCH_LIMIT,
                max_consecutive_failures: config.rest_max_failures,
            };
            tokio::spawn(run_rest_poller(
                data.clone(),
                poller_config,
                feed_tx,
                shutdown_rx.clone(),
            ));

            let markets: Arc<dyn MarketDataProvider> =
                Arc::new(MarketService::new(Arc::new(GammaClient::new()), MARKET_CACHE_CAPACITY));
            let wallets: Arc<dyn WalletDataProvider> = Arc::new(WalletService::new(
                Arc::new(data),
                WALLET_CACHE_CAPACITY,
                WALLET_CACHE_TTL,
            ));
            (Box::new(channel_source) as Box<dyn TradeSource>, markets, wallets)
        }
    };

    // --- Sinks ---
    let mut sinks: Vec<Arc<dyn AlertSink>> = vec![
        Arc::new(ConsoleSink::new()),
        Arc::new(BroadcastSink::new(ws_tx.clone())),
    ];
    if let (Some(token), Some(chat)) = (&config.telegram_bot_token, &config.telegram_chat_id) {
        sinks.push(Arc::new(TelegramSink::new(token.clone(), chat.clone())));
    } else {
        tracing::info!("Telegram not configured, alerts go to console and WebSocket only");
    }

    let enrichment = EnrichmentService::new(
        wallets,
        default_detectors(&config.detectors),
        config.alert_confidence_threshold,
    );
    let mut pipeline = Pipeline::new(markets, FilterChain::from_config(&config), enrichment, sinks);
    let stats = pipeline.stats();

    spawn_stats_broadcast(Arc::clone(&stats), ws_tx.clone(), shutdown_rx.clone());

    // --- HTTP surface ---
    let state = AppState {
        stats,
        ws_tx,
        metrics_handle,
        api_token: config.api_token.as_deref().map(Arc::from),
        started_at: Instant::now(),
    };
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");

    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, create_router(state))
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });

    let signal_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            return;
        }
        tracing::info!("Shutdown requested");
        signal_tx.send_replace(true);
    });

    let outcome = pipeline.run(source.as_mut(), shutdown_rx).await;

    // Stop the HTTP server and stats task whatever ended the pipeline
    shutdown_tx.send_replace(true);
    match tokio::time::timeout(SERVER_DRAIN, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!("HTTP server did not stop within {SERVER_DRAIN:?}"),
    }

    match outcome {
        Ok(stats) => {
            tracing::info!(alerts = stats.alerts_emitted, "Scanner finished");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn spawn_stats_broadcast(
    stats: Arc<StatsHandle>,
    ws_tx: broadcast::Sender<WsMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // No receivers is not an error
                    let _ = ws_tx.send(WsMessage::Stats(stats.snapshot()));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
