use crate::models::TradeError;

/// Failure of a market or wallet data collaborator. The pipeline degrades to
/// default context on any of these.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// A single detector failed on a single trade.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("{detector}: {message}")]
    Failed {
        detector: &'static str,
        message: String,
    },

    #[error("{0} panicked")]
    Panicked(&'static str),
}

/// Delivery to one sink failed.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink rejected alert: {0}")]
    Rejected(String),

    #[error("sink closed")]
    Closed,
}

/// Trade source failures. `Malformed` items are dropped by the coordinator;
/// `Disconnected` ends its loop.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("trade source disconnected: {0}")]
    Disconnected(String),

    #[error("malformed trade: {0}")]
    Malformed(#[from] TradeError),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
}
