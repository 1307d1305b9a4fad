use axum::{extract::State, Json};
use serde_json::{json, Map, Value};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

/// POST /v1/payments/payway-callback
/// Unauthenticated; the body hash is the only credential.
pub async fn handle_payway_callback(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Map<String, Value>>,
) -> Result<Json<Value>, AppError> {
    tracing::info!(
        tran_id = payload.get("tran_id").and_then(serde_json::Value::as_str).unwrap_or(""),
        "Received payment callback"
    );

    state.orchestrator.handle_callback(&payload).await?;
    Ok(Json(json!({ "success": true })))
}
