use axum::{
    http::{header, HeaderName, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod middleware;
pub mod payments;
pub mod state;
pub mod webhooks;

pub use state::{AppState, RateLimitSettings};

pub fn app(state: AppState) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT])
        .expose_headers([
            request_id.clone(),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
        ]);

    let v1 = Router::new()
        .merge(bookings::routes())
        .merge(payments::routes())
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit));

    Router::new()
        .nest("/v1", v1)
        .route("/health", get(health))
        .route("/metrics", get(metrics::handle_metrics))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::identify))
        .layer(axum::middleware::from_fn_with_state(state.clone(), error::error_envelope))
        .layer(cors)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
