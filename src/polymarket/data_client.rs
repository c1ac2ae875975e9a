use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;

use super::types::ApiTrade;
use crate::errors::ProviderError;
use crate::models::WalletProfile;
use crate::services::WalletDataProvider;

const DATA_API_BASE: &str = "https://data-api.polymarket.com";
const HISTORY_LIMIT: u32 = 500;

/// Polymarket Data API client. Wallet profiles are derived from the
/// wallet's recent trade history.
#[derive(Debug, Clone)]
pub struct DataClient {
    http: Client,
    base_url: String,
}

impl DataClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: DATA_API_BASE.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch trades for a specific wallet address.
    pub async fn get_trades_by_wallet(&self, wallet: &str) -> Result<Vec<ApiTrade>, ProviderError> {
        let url = format!("{}/trades", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("user", wallet), ("limit", &HISTORY_LIMIT.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let trades: Vec<ApiTrade> = resp.json().await?;
        Ok(trades)
    }

    /// Fetch the most recent fills across all markets, newest first.
    pub async fn get_recent_trades(&self, limit: u32) -> Result<Vec<ApiTrade>, ProviderError> {
        let url = format!("{}/trades", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let trades: Vec<ApiTrade> = resp.json().await?;
        Ok(trades)
    }
}

/// Summarise a trade history. Win rate is not derivable from fills alone and
/// stays at the neutral 0.5.
pub fn profile_from_trades(address: &str, trades: &[ApiTrade]) -> Option<WalletProfile> {
    if trades.is_empty() {
        return None;
    }

    let total_trades = u32::try_from(trades.len()).unwrap_or(u32::MAX);
    let total_volume_usd: Decimal = trades.iter().map(ApiTrade::notional).sum();
    let timestamps = trades.iter().filter_map(ApiTrade::timestamp);

    Some(WalletProfile {
        total_trades,
        total_volume_usd,
        avg_trade_size: total_volume_usd / Decimal::from(total_trades),
        first_seen: timestamps.clone().min(),
        last_seen: timestamps.max(),
        ..WalletProfile::empty(address)
    })
}

#[async_trait]
impl WalletDataProvider for DataClient {
    async fn get_profile(&self, address: &str) -> Result<Option<WalletProfile>, ProviderError> {
        let trades = self.get_trades_by_wallet(address).await?;
        Ok(profile_from_trades(address, &trades))
    }
}
