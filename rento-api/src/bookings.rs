use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rento_booking::{Actor, CreateBookingRequest, CreatedBooking};
use rento_core::booking::{Booking, PartyRole};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{data, AppJson, AppPath, AppQuery, Data};
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub role: Option<PartyRole>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/approve", post(approve_booking))
        .route("/bookings/{id}/decline", post(decline_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/bookings/{id}/activate", post(activate_booking))
        .route("/bookings/{id}/complete", post(complete_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(req): AppJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Data<CreatedBooking>>), AppError> {
    let created = state.orchestrator.create(user_id, req).await?;
    Ok((StatusCode::CREATED, data(created)))
}

async fn list_bookings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<Data<Vec<Booking>>>, AppError> {
    let bookings = state.orchestrator.list_for_user(user_id, query.role).await?;
    Ok(data(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Data<Booking>>, AppError> {
    Ok(data(state.orchestrator.get(id, user_id).await?))
}

async fn approve_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Data<Booking>>, AppError> {
    Ok(data(state.orchestrator.approve(id, user_id).await?))
}

async fn decline_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Data<Booking>>, AppError> {
    Ok(data(state.orchestrator.decline(id, user_id).await?))
}

/// The body is optional; an empty request cancels without a reason.
async fn cancel_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let body: CancelBody = if body.iter().all(u8::is_ascii_whitespace) {
        CancelBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let booking = state.orchestrator.cancel(id, user_id, body.reason).await?;
    Ok(data(booking))
}

async fn activate_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Data<Booking>>, AppError> {
    Ok(data(state.orchestrator.activate(id, Actor::User(user_id)).await?))
}

async fn complete_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Data<Booking>>, AppError> {
    // The transition runs as the system; over HTTP only a party may trigger it
    state.orchestrator.get(id, user_id).await?;
    Ok(data(state.orchestrator.complete(id).await?))
}
