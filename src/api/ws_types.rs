use serde::Serialize;

use crate::ingestion::pipeline::PipelineStats;
use crate::models::Alert;

/// Messages broadcast to all connected WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename = "alert")]
    Alert(Alert),

    #[serde(rename = "stats")]
    Stats(PipelineStats),
}
