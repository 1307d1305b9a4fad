use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rento_core::identity::IdentityProvider;
use rento_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub exp: usize,
}

/// Verifies HS256 bearer tokens signed with the shared secret.
pub struct JwtIdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> CoreResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + ttl).timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CoreError::Authentication(format!("Token encoding failed: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn resolve(&self, token: &str) -> CoreResult<Uuid> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| CoreError::Authentication(format!("Invalid token: {}", e)))?;
        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| CoreError::Authentication("Invalid token subject".into()))
    }
}

/// The authenticated caller. Extracting it fails with 401 when the request
/// carried no valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| CoreError::Authentication("Authentication required".into()).into())
    }
}

/// Resolve the bearer token, if any, and stash the caller for handlers and
/// the rate limiter. Never rejects on its own.
pub async fn identify(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    if let Ok(TypedHeader(Authorization(bearer))) =
        parts.extract::<TypedHeader<Authorization<Bearer>>>().await
    {
        match state.identity.resolve(bearer.token()).await {
            Ok(user_id) => {
                parts.extensions.insert(AuthUser(user_id));
            }
            Err(e) => tracing::debug!("Bearer token rejected: {}", e),
        }
    }

    next.run(Request::from_parts(parts, body)).await
}
