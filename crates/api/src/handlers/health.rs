use axum::{extract::State, response::Json};
use pager_relay::Diagnose;

use crate::ApiState;

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Json<Diagnose> {
    Json(state.relay.diagnose())
}
