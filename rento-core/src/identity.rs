use async_trait::async_trait;
use uuid::Uuid;

use crate::CoreResult;

/// Resolves a bearer credential to a stable user id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fails with `CoreError::Authentication` for missing, expired or forged tokens
    async fn resolve(&self, token: &str) -> CoreResult<Uuid>;
}
