pub mod enrichment;
pub mod market_service;
pub mod wallet_service;

pub use enrichment::{EnrichmentOutcome, EnrichmentService};
pub use market_service::{MarketDataProvider, MarketService, StaticMarkets};
pub use wallet_service::{InMemoryWallets, WalletDataProvider, WalletService};
