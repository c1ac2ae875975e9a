use axum::extract::State;
use axum::Json;

use crate::ingestion::PipelineStats;
use crate::AppState;

pub async fn get_stats(State(state): State<AppState>) -> Json<PipelineStats> {
    Json(state.stats.snapshot())
}
