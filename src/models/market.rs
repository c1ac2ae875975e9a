use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market category taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCategory {
    Politics,
    Sports,
    Crypto,
    Science,
    Economics,
    Entertainment,
    TimeBased,
    Other,
}

impl MarketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCategory::Politics => "politics",
            MarketCategory::Sports => "sports",
            MarketCategory::Crypto => "crypto",
            MarketCategory::Science => "science",
            MarketCategory::Economics => "economics",
            MarketCategory::Entertainment => "entertainment",
            MarketCategory::TimeBased => "time_based",
            MarketCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "politics" => Some(MarketCategory::Politics),
            "sports" => Some(MarketCategory::Sports),
            "crypto" => Some(MarketCategory::Crypto),
            "science" => Some(MarketCategory::Science),
            "economics" => Some(MarketCategory::Economics),
            "entertainment" => Some(MarketCategory::Entertainment),
            "time_based" | "time-based" | "timebased" => Some(MarketCategory::TimeBased),
            "other" => Some(MarketCategory::Other),
            _ => None,
        }
    }

    /// Keyword classification of a market question, for APIs that do not
    /// return a usable category.
    pub fn infer(question: &str) -> Self {
        let q = question.to_lowercase();
        let words: Vec<&str> = q
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |keys: &[&str]| keys.iter().any(|k| words.contains(k));

        if has(&["up", "down"]) && (q.contains(" am ") || q.contains(" pm ") || q.contains("minute")) {
            MarketCategory::TimeBased
        } else if has(&["election", "trump", "biden", "president", "congress", "senate", "governor"]) {
            MarketCategory::Politics
        } else if has(&["bitcoin", "ethereum", "crypto", "btc", "eth", "solana", "xrp"]) {
            MarketCategory::Crypto
        } else if has(&["nfl", "nba", "nhl", "mlb", "soccer", "football", "match", "vs", "championship"]) {
            MarketCategory::Sports
        } else if has(&["fed", "inflation", "gdp", "economy", "recession", "rates"]) {
            MarketCategory::Economics
        } else if has(&["ai", "spacex", "nasa", "science", "vaccine"]) {
            MarketCategory::Science
        } else if has(&["oscar", "oscars", "grammy", "movie", "album", "box"]) {
            MarketCategory::Entertainment
        } else {
            MarketCategory::Other
        }
    }
}

impl std::fmt::Display for MarketCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market metadata as seen by the scanner. Read-only context owned by the
/// market-data collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    pub category: MarketCategory,
    pub end_date: Option<DateTime<Utc>>,
    /// Current YES probability in [0, 1].
    pub yes_price: Decimal,
    pub liquidity: Decimal,
    pub volume_24h: Decimal,
}

impl Market {
    /// Degraded context used when market metadata cannot be fetched.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            question: "Unknown market".into(),
            category: MarketCategory::Other,
            end_date: None,
            yes_price: Decimal::new(5, 1),
            liquidity: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
        }
    }

    pub fn no_price(&self) -> Decimal {
        Decimal::ONE - self.yes_price
    }

    /// True while the market has not reached its end date at `at`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        match self.end_date {
            Some(end) => at < end,
            None => true,
        }
    }
}
