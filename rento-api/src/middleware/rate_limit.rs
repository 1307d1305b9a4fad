use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rento_core::CoreError;
use std::net::SocketAddr;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Authenticated callers are counted per user, everyone else per client IP.
fn client_key(req: &Request) -> String {
    if let Some(AuthUser(user_id)) = req.extensions().get::<AuthUser>() {
        return format!("api:{}", user_id);
    }

    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    let ip = forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());
    format!("api:{}", ip)
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    let settings = state.rate_limit;

    let decision = match state
        .rate_limiter
        .hit(&key, settings.max_requests, settings.window)
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            // Fail open
            tracing::warn!(key = %key, "Rate limit store unavailable: {}", e);
            return next.run(req).await;
        }
    };

    let reset = decision.reset_after.as_secs().max(1);
    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!(key = %key, "Rate limit exceeded");
        AppError::from(CoreError::RateLimit { retry_after: reset }).into_response()
    };

    let headers = response.headers_mut();
    set_header(headers, "x-ratelimit-limit", u64::from(decision.limit));
    set_header(headers, "x-ratelimit-remaining", u64::from(decision.remaining));
    set_header(headers, "x-ratelimit-reset", reset);
    response
}
