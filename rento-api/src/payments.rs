use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use rento_core::payment::{RefundResult, TransactionCheck};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{data, AppPath, Data};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::webhooks;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/payway-callback", post(webhooks::handle_payway_callback))
        .route("/payments/{id}/status", get(payment_status))
        .route("/payments/{id}/refund", post(refund_payment))
}

/// GET /v1/payments/{id}/status, where `id` is a ledger entry
async fn payment_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Data<TransactionCheck>>, AppError> {
    Ok(data(state.orchestrator.payment_status(id, user_id).await?))
}

async fn refund_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Data<RefundResult>>, AppError> {
    Ok(data(state.orchestrator.refund(id, user_id).await?))
}
