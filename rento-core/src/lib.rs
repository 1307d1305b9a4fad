pub mod booking;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod listing;
pub mod payment;
pub mod rate_limit;
pub mod repository;

use booking::BookingStatus;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Cannot transition booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("Payment rejected: {0}")]
    Payment(String),
    #[error("External service error: {0}")]
    ExternalService(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Too many requests, please try again later")]
    RateLimit { retry_after: u64 },
}

impl CoreError {
    /// Stable machine-readable code used in the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Authentication(_) => "AUTHENTICATION_REQUIRED",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::Payment(_) => "PAYMENT_ERROR",
            CoreError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            CoreError::Database(_) => "DATABASE_ERROR",
            CoreError::RateLimit { .. } => "RATE_LIMIT_EXCEEDED",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
