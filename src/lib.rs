pub mod api;
pub mod config;
pub mod errors;
pub mod filters;
pub mod ingestion;
pub mod intelligence;
pub mod metrics;
pub mod models;
pub mod polymarket;
pub mod services;
pub mod signals;
pub mod sinks;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::api::ws_types::WsMessage;
use crate::ingestion::StatsHandle;

#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<StatsHandle>,
    pub ws_tx: broadcast::Sender<WsMessage>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub api_token: Option<Arc<str>>,
    pub started_at: Instant,
}
