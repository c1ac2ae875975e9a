use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::parse_timestamp;
use crate::errors::ProviderError;
use crate::models::{Market, MarketCategory};
use crate::services::MarketDataProvider;

const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

/// Gamma sends most numbers as strings, some as numbers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Numeric::Number(n) => Decimal::try_from(*n).ok(),
            Numeric::Text(s) => Decimal::from_str(s.trim()).ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GammaMarket {
    #[serde(alias = "conditionId")]
    pub condition_id: String,
    pub question: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Stringified JSON array of outcome prices, e.g. "[\"0.62\", \"0.38\"]"
    #[serde(default, alias = "outcomePrices")]
    pub outcome_prices: Option<String>,
    /// Stringified JSON array of token IDs, e.g. "[\"token1\", \"token2\"]"
    #[serde(default, alias = "clobTokenIds")]
    pub clob_token_ids: Option<String>,
    #[serde(default)]
    pub liquidity: Option<Numeric>,
    #[serde(default, alias = "volume24hr")]
    pub volume_24hr: Option<Numeric>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,
}

impl GammaMarket {
    /// Parse the stringified clobTokenIds into a Vec of token ID strings.
    pub fn parse_token_ids(&self) -> Vec<String> {
        self.clob_token_ids
            .as_deref()
            .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
            .unwrap_or_default()
    }

    /// Price of the first (YES) outcome.
    pub fn yes_price(&self) -> Option<Decimal> {
        let prices: Vec<String> = serde_json::from_str(self.outcome_prices.as_deref()?).ok()?;
        let yes = Decimal::from_str(prices.first()?).ok()?;
        (yes >= Decimal::ZERO && yes <= Decimal::ONE).then_some(yes)
    }

    pub fn into_market(self) -> Market {
        let category = self
            .category
            .as_deref()
            .and_then(MarketCategory::from_str)
            .unwrap_or_else(|| MarketCategory::infer(&self.question));

        Market {
            yes_price: self.yes_price().unwrap_or(Decimal::new(5, 1)),
            liquidity: self
                .liquidity
                .as_ref()
                .and_then(Numeric::to_decimal)
                .unwrap_or(Decimal::ZERO),
            volume_24h: self
                .volume_24hr
                .as_ref()
                .and_then(Numeric::to_decimal)
                .unwrap_or(Decimal::ZERO),
            end_date: self.end_date.as_deref().and_then(parse_timestamp),
            category,
            question: self.question,
            id: self.condition_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GammaClient {
    http: Client,
    base_url: String,
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GammaClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url: GAMMA_API_BASE.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch active markets from the Gamma API with pagination.
    pub async fn get_active_markets(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<GammaMarket>, ProviderError> {
        let url = format!("{}/markets", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("active", "true"),
                ("closed", "false"),
                ("limit", &limit.to_string()),
                ("offset", &offset.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let markets: Vec<GammaMarket> = resp.json().await?;
        Ok(markets)
    }

    /// Token ids of up to `limit` active markets, for the trade feed
    /// subscription.
    pub async fn active_token_ids(&self, limit: u32) -> Result<Vec<String>, ProviderError> {
        let markets = self.get_active_markets(limit, 0).await?;
        Ok(markets.iter().flat_map(GammaMarket::parse_token_ids).collect())
    }

    pub async fn get_market_by_condition(
        &self,
        condition_id: &str,
    ) -> Result<Option<GammaMarket>, ProviderError> {
        let url = format!("{}/markets", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("condition_ids", condition_id)])
            .send()
            .await?
            .error_for_status()?;

        let markets: Vec<GammaMarket> = resp.json().await?;
        Ok(markets.into_iter().find(|m| m.condition_id == condition_id))
    }
}

#[async_trait]
impl MarketDataProvider for GammaClient {
    async fn get_market(&self, market_id: &str) -> Result<Option<Market>, ProviderError> {
        Ok(self
            .get_market_by_condition(market_id)
            .await?
            .map(GammaMarket::into_market))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gamma(json: &str) -> GammaMarket {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_into_market() {
        let market = gamma(
            r#"{
                "conditionId": "0xcond",
                "question": "Will the Fed cut interest rates in March?",
                "outcomePrices": "[\"0.62\", \"0.38\"]",
                "clobTokenIds": "[\"111\", \"222\"]",
                "liquidity": "125000.5",
                "volume24hr": 40210.25,
                "endDate": "2026-03-18T18:00:00Z"
            }"#,
        )
        .into_market();

        assert_eq!(market.id, "0xcond");
        assert_eq!(market.yes_price, Decimal::new(62, 2));
        assert_eq!(market.liquidity, Decimal::new(1250005, 1));
        assert_eq!(market.volume_24h, Decimal::new(4021025, 2));
        assert_eq!(market.category, MarketCategory::Economics);
        assert!(market.end_date.is_some());
    }

    #[test]
    fn test_missing_prices_fall_back_to_even_odds() {
        let market = gamma(r#"{"condition_id": "c", "question": "Who wins the match?", "category": "Sports"}"#)
            .into_market();
        assert_eq!(market.yes_price, Decimal::new(5, 1));
        assert_eq!(market.category, MarketCategory::Sports);
        assert_eq!(market.liquidity, Decimal::ZERO);
    }

    #[test]
    fn test_parse_token_ids() {
        let m = gamma(r#"{"condition_id": "c", "question": "q", "clobTokenIds": "[\"1\",\"2\"]"}"#);
        assert_eq!(m.parse_token_ids(), vec!["1", "2"]);
    }
}
