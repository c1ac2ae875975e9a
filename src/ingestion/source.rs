use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::SourceError;
use crate::models::Trade;

/// A stream of trades feeding the pipeline.
///
/// `None` means the source is exhausted. `Some(Err(SourceError::Malformed))`
/// is a single bad item; `Some(Err(SourceError::Disconnected))` is terminal.
#[async_trait]
pub trait TradeSource: Send {
    async fn next_trade(&mut self) -> Option<Result<Trade, SourceError>>;
}

/// Receives trades pushed by a background producer such as the WebSocket
/// listener. Exhausted once every sender is dropped.
pub struct ChannelSource {
    rx: mpsc::Receiver<Result<Trade, SourceError>>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Result<Trade, SourceError>>) -> Self {
        Self { rx }
    }

    /// A bounded channel and the source reading from it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<Trade, SourceError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl TradeSource for ChannelSource {
    async fn next_trade(&mut self) -> Option<Result<Trade, SourceError>> {
        self.rx.recv().await
    }
}

/// A finite, pre-built sequence of items. Used for replays and tests.
pub struct IterSource {
    items: std::vec::IntoIter<Result<Trade, SourceError>>,
}

impl IterSource {
    pub fn new(trades: impl IntoIterator<Item = Trade>) -> Self {
        Self::from_results(trades.into_iter().map(Ok))
    }

    pub fn from_results(items: impl IntoIterator<Item = Result<Trade, SourceError>>) -> Self {
        Self {
            items: items.into_iter().collect::<Vec<_>>().into_iter(),
        }
    }
}

#[async_trait]
impl TradeSource for IterSource {
    async fn next_trade(&mut self) -> Option<Result<Trade, SourceError>> {
        self.items.next()
    }
}
