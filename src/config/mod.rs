use rust_decimal::Decimal;
use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::MarketCategory;

const ENV_PREFIX: &str = "SCANNER_";
const DEFAULT_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("{key} must be within [0, 1], got {value}")]
    NotAProbability { key: &'static str, value: Decimal },

    #[error("{0}")]
    Inconsistent(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub min_trade_size_usd: Decimal,
    pub excluded_categories: HashSet<MarketCategory>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_trade_size_usd: Decimal::from(2_000),
            excluded_categories: [
                MarketCategory::Sports,
                MarketCategory::Crypto,
                MarketCategory::TimeBased,
            ]
            .into_iter()
            .collect(),
        }
    }
}

/// Liquidity-provider detection window and thresholds.
#[derive(Debug, Clone)]
pub struct LpConfig {
    /// Max trades retained per wallet.
    pub window_trades: usize,
    /// Max age of a retained trade, relative to the newest one.
    pub window: Duration,
    /// Trades needed inside the window before a wallet can be flagged.
    pub min_trades: usize,
    /// `|yes_share - 0.5| * 2` below this counts as balanced (default 0.1).
    pub balance_threshold: Decimal,
    /// Share of consecutive trades flipping side that counts as alternating.
    pub alternation_ratio: Decimal,
    /// Max coefficient of variation of trade sizes (default 0.25).
    pub max_size_cv: Decimal,
    /// Wallets tracked before least-recently-seen ones are evicted.
    pub max_tracked_wallets: usize,
}

impl Default for LpConfig {
    fn default() -> Self {
        Self {
            window_trades: 10,
            window: Duration::from_secs(24 * 60 * 60),
            min_trades: 4,
            balance_threshold: Decimal::new(1, 1),       // 0.10
            alternation_ratio: Decimal::new(7, 1),       // 0.70
            max_size_cv: Decimal::new(25, 2),            // 0.25
            max_tracked_wallets: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub fresh_wallet_trade_threshold: u32,
    pub size_anomaly_multiplier: Decimal,
    pub large_trade_usd: Decimal,
    pub liquidity_share: Decimal,
    /// UTC hours treated as off-peak.
    pub off_peak_hours: Vec<u32>,
    pub resolution_window: Duration,
    pub odds_min_move: Decimal,
    pub odds_lookback: Duration,
    pub contrarian_high: Decimal,
    pub contrarian_low: Decimal,
    pub clustering_window: Duration,
    pub clustering_min_wallets: usize,
    /// Markets each stateful detector keeps history for.
    pub max_tracked_markets: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fresh_wallet_trade_threshold: 5,
            size_anomaly_multiplier: Decimal::from(3),
            large_trade_usd: Decimal::from(50_000),
            liquidity_share: Decimal::new(5, 2),         // 0.05
            off_peak_hours: (0..6).collect(),
            resolution_window: Duration::from_secs(24 * 60 * 60),
            odds_min_move: Decimal::new(5, 2),           // 0.05
            odds_lookback: Duration::from_secs(5 * 60),
            contrarian_high: Decimal::new(70, 2),
            contrarian_low: Decimal::new(30, 2),
            clustering_window: Duration::from_secs(300),
            clustering_min_wallets: 3,
            max_tracked_markets: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Mock,
    WebSocket,
    /// Polls the Data API `/trades` endpoint.
    Rest,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub filters: FilterConfig,
    pub lp: LpConfig,
    pub detectors: DetectorConfig,
    pub alert_confidence_threshold: Decimal,

    // Trade source
    pub source: SourceKind,
    pub ws_url: String,
    pub ws_asset_ids: Vec<String>,
    /// Failed reconnects before the feed counts as disconnected. `None`
    /// retries forever.
    pub ws_max_reconnect_attempts: Option<u32>,
    pub rest_poll_interval: Duration,
    /// Consecutive failed polls before the feed counts as disconnected.
    /// `None` polls forever.
    pub rest_max_failures: Option<u32>,
    pub mock_trades_per_minute: u32,

    // Sinks
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // HTTP surface
    pub host: String,
    pub port: u16,
    /// Bearer token for `/api` and `/ws`. Unset disables auth.
    pub api_token: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            filters: FilterConfig::default(),
            lp: LpConfig::default(),
            detectors: DetectorConfig::default(),
            alert_confidence_threshold: Decimal::new(65, 2),
            source: SourceKind::Mock,
            ws_url: DEFAULT_WS_URL.into(),
            ws_asset_ids: Vec::new(),
            ws_max_reconnect_attempts: Some(10),
            rest_poll_interval: Duration::from_secs(5),
            rest_max_failures: Some(10),
            mock_trades_per_minute: 20,
            telegram_bot_token: None,
            telegram_chat_id: None,
            host: "0.0.0.0".into(),
            port: 8080,
            api_token: None,
        }
    }
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Keys are the full variable names,
    /// `SCANNER_` prefix included.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let d = ScannerConfig::default();

        let excluded_categories = match vars.raw("EXCLUDED_CATEGORIES") {
            Some(raw) => parse_categories(&raw)?,
            None => d.filters.excluded_categories,
        };

        let off_peak_hours = match vars.raw("OFF_PEAK_HOURS") {
            Some(raw) => split_list(&raw)
                .map(|h| match h.parse::<u32>() {
                    Ok(hour) if hour < 24 => Ok(hour),
                    _ => Err(invalid("OFF_PEAK_HOURS", &raw)),
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => d.detectors.off_peak_hours,
        };

        let source = match vars.raw("SOURCE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("mock") => SourceKind::Mock,
            Some("ws") | Some("websocket") => SourceKind::WebSocket,
            Some("rest") | Some("poll") => SourceKind::Rest,
            Some(other) => return Err(invalid("SOURCE", other)),
        };

        let ws_max_reconnect_attempts = match vars.parse::<u32>("WS_MAX_RECONNECTS", 10)? {
            0 => None,
            n => Some(n),
        };
        let rest_max_failures = match vars.parse::<u32>("REST_MAX_FAILURES", 10)? {
            0 => None,
            n => Some(n),
        };

        let config = Self {
            filters: FilterConfig {
                min_trade_size_usd: vars.parse("MIN_TRADE_SIZE_USD", d.filters.min_trade_size_usd)?,
                excluded_categories,
            },
            lp: LpConfig {
                window_trades: vars.parse("LP_WINDOW_TRADES", d.lp.window_trades)?,
                window: vars.secs("LP_WINDOW_SECS", d.lp.window)?,
                min_trades: vars.parse("LP_MIN_TRADES", d.lp.min_trades)?,
                balance_threshold: vars.parse("LP_BALANCE_THRESHOLD", d.lp.balance_threshold)?,
                alternation_ratio: vars.parse("LP_ALTERNATION_RATIO", d.lp.alternation_ratio)?,
                max_size_cv: vars.parse("LP_MAX_SIZE_CV", d.lp.max_size_cv)?,
                max_tracked_wallets: vars.parse("LP_MAX_WALLETS", d.lp.max_tracked_wallets)?,
            },
            detectors: DetectorConfig {
                fresh_wallet_trade_threshold: vars.parse(
                    "FRESH_WALLET_TRADE_THRESHOLD",
                    d.detectors.fresh_wallet_trade_threshold,
                )?,
                size_anomaly_multiplier: vars
                    .parse("SIZE_ANOMALY_MULTIPLIER", d.detectors.size_anomaly_multiplier)?,
                large_trade_usd: vars.parse("LARGE_TRADE_USD", d.detectors.large_trade_usd)?,
                liquidity_share: vars.parse("LIQUIDITY_SHARE", d.detectors.liquidity_share)?,
                off_peak_hours,
                resolution_window: Duration::from_secs(
                    vars.parse::<u64>("RESOLUTION_WINDOW_HOURS", 24)? * 60 * 60,
                ),
                odds_min_move: vars.parse("ODDS_MIN_MOVE", d.detectors.odds_min_move)?,
                odds_lookback: vars.secs("ODDS_LOOKBACK_SECS", d.detectors.odds_lookback)?,
                contrarian_high: vars.parse("CONTRARIAN_HIGH", d.detectors.contrarian_high)?,
                contrarian_low: vars.parse("CONTRARIAN_LOW", d.detectors.contrarian_low)?,
                clustering_window: vars
                    .secs("CLUSTERING_WINDOW_SECS", d.detectors.clustering_window)?,
                clustering_min_wallets: vars
                    .parse("CLUSTERING_MIN_WALLETS", d.detectors.clustering_min_wallets)?,
                max_tracked_markets: vars
                    .parse("MAX_TRACKED_MARKETS", d.detectors.max_tracked_markets)?,
            },
            alert_confidence_threshold: vars
                .parse("ALERT_CONFIDENCE_THRESHOLD", d.alert_confidence_threshold)?,
            source,
            ws_url: vars.raw("WS_URL").unwrap_or(d.ws_url),
            ws_asset_ids: vars
                .raw("WS_ASSET_IDS")
                .map(|raw| split_list(&raw).map(String::from).collect())
                .unwrap_or_default(),
            ws_max_reconnect_attempts,
            rest_poll_interval: vars.secs("REST_POLL_SECS", d.rest_poll_interval)?,
            rest_max_failures,
            mock_trades_per_minute: vars
                .parse("MOCK_TRADES_PER_MINUTE", d.mock_trades_per_minute)?,
            telegram_bot_token: vars.raw("TELEGRAM_BOT_TOKEN").filter(|s| !s.is_empty()),
            telegram_chat_id: vars.raw("TELEGRAM_CHAT_ID").filter(|s| !s.is_empty()),
            host: vars.raw("HOST").unwrap_or(d.host),
            port: vars.parse("PORT", d.port)?,
            api_token: vars
                .unprefixed("API_TOKEN")
                .or_else(|| vars.raw("API_TOKEN"))
                .filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let probabilities = [
            ("ALERT_CONFIDENCE_THRESHOLD", self.alert_confidence_threshold),
            ("LP_BALANCE_THRESHOLD", self.lp.balance_threshold),
            ("LP_ALTERNATION_RATIO", self.lp.alternation_ratio),
            ("LIQUIDITY_SHARE", self.detectors.liquidity_share),
            ("ODDS_MIN_MOVE", self.detectors.odds_min_move),
            ("CONTRARIAN_HIGH", self.detectors.contrarian_high),
            ("CONTRARIAN_LOW", self.detectors.contrarian_low),
        ];
        for (key, value) in probabilities {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(ConfigError::NotAProbability { key, value });
            }
        }

        if self.detectors.contrarian_low >= self.detectors.contrarian_high {
            return Err(ConfigError::Inconsistent(format!(
                "contrarian band is inverted: low {} >= high {}",
                self.detectors.contrarian_low, self.detectors.contrarian_high
            )));
        }
        if self.lp.window_trades == 0 || self.lp.max_tracked_wallets == 0 {
            return Err(ConfigError::Inconsistent(
                "LP window and wallet capacity must be positive".into(),
            ));
        }
        if self.detectors.clustering_window.is_zero() || self.detectors.max_tracked_markets == 0 {
            return Err(ConfigError::Inconsistent(
                "clustering window and market capacity must be positive".into(),
            ));
        }
        if self.rest_poll_interval.is_zero() {
            return Err(ConfigError::Inconsistent("REST poll interval must be positive".into()));
        }
        if self.min_trade_size_usd() < Decimal::ZERO {
            return Err(ConfigError::Inconsistent("minimum trade size is negative".into()));
        }

        Ok(())
    }

    pub fn min_trade_size_usd(&self) -> Decimal {
        self.filters.min_trade_size_usd
    }

    /// Returns true if both Telegram credentials are configured.
    pub fn has_telegram(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{key}")).map(|v| v.trim().to_string())
    }

    fn unprefixed(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.raw(key) {
            Some(raw) if !raw.is_empty() => raw.parse().map_err(|_| invalid(key, &raw)),
            _ => Ok(default),
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_secs()).map(Duration::from_secs)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: format!("{ENV_PREFIX}{key}"),
        value: value.to_string(),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_categories(raw: &str) -> Result<HashSet<MarketCategory>, ConfigError> {
    split_list(raw)
        .map(|c| MarketCategory::from_str(c).ok_or_else(|| invalid("EXCLUDED_CATEGORIES", c)))
        .collect()
}
