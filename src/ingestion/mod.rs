pub mod mock_source;
pub mod pipeline;
pub mod rest_poller;
pub mod source;
pub mod ws_listener;

pub use mock_source::MockTradeGenerator;
pub use pipeline::{Pipeline, PipelineStats, StatsHandle};
pub use rest_poller::{run_rest_poller, RestPoller, RestPollerConfig};
pub use source::{ChannelSource, IterSource, TradeSource};
pub use ws_listener::{run_ws_listener, WsListenerConfig};
