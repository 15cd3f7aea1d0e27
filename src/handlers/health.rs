use axum::{extract::State, response::Json};
use serde_json::json;

use crate::{error::Result, handlers::AppState};

pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    Ok(Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs()
    })))
}
