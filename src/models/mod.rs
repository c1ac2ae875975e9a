pub mod alert;
pub mod market;
pub mod signal;
pub mod trade;
pub mod wallet;

pub use alert::Alert;
pub use market::{Market, MarketCategory};
pub use signal::{Confidence, Signal, SignalType};
pub use trade::{Trade, TradeError};
pub use wallet::WalletProfile;

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Outcome a trade takes a position on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Map CLOB side strings onto outcomes. A BUY on the primary token is a
    /// YES position, a SELL is a NO position.
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "YES" | "BUY" | "0" => Some(Side::Yes),
            "NO" | "SELL" | "1" => Some(Side::No),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Shorten a wallet address to `0x1234...abcd` for display.
/// Counts characters, not bytes, so any UTF-8 input is safe.
pub fn short_address(address: &str) -> String {
    let len = address.chars().count();
    if len > 10 {
        let head: String = address.chars().take(6).collect();
        let tail: String = address.chars().skip(len - 4).collect();
        format!("{head}...{tail}")
    } else {
        address.to_string()
    }
}
