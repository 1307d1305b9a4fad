use axum::{
    body::Body,
    extract::{rejection::JsonRejection, rejection::PathRejection, rejection::QueryRejection, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rento_core::CoreError;
use serde_json::{json, Map, Value};

use crate::state::AppState;

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    /// Malformed request that never reached the domain
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Core(err) => match err {
                CoreError::Validation(_) | CoreError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
                CoreError::Authentication(_) => StatusCode::UNAUTHORIZED,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
                CoreError::ExternalService(_) => StatusCode::BAD_GATEWAY,
                CoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                CoreError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Core(err) => err.code(),
            AppError::BadRequest(_) => "VALIDATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn report(&self) -> ErrorReport {
        let mut report = ErrorReport {
            status: self.status(),
            code: self.code(),
            message: self.to_string(),
            extra: Map::new(),
            debug: format!("{:?}", self),
        };

        match self {
            AppError::Core(CoreError::InvalidTransition { from, to }) => {
                report
                    .extra
                    .insert("details".into(), json!({ "from": from, "to": to }));
            }
            AppError::Core(CoreError::RateLimit { retry_after }) => {
                report.extra.insert("retry_after".into(), json!(retry_after));
            }
            _ => {}
        }
        report
    }
}

/// Everything needed to render the error envelope. Attached to the response
/// so [`error_envelope`] can add the request id and debug output.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    extra: Map<String, Value>,
    debug: String,
}

impl ErrorReport {
    fn is_internal(&self) -> bool {
        self.status.is_server_error()
    }

    pub fn body(&self, request_id: Option<&str>, production: bool) -> Value {
        let mut error = Map::new();
        error.insert("code".into(), json!(self.code));
        let message = if production && self.is_internal() {
            GENERIC_MESSAGE
        } else {
            self.message.as_str()
        };
        error.insert("message".into(), json!(message));
        error.insert("request_id".into(), json!(request_id));
        error.extend(self.extra.clone());
        if !production && self.is_internal() {
            error.insert("debug".into(), json!(self.debug));
        }
        json!({ "error": error })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let report = self.report();
        if report.is_internal() {
            tracing::error!(code = report.code, "Request failed: {}", report.debug);
        }

        let mut response = (report.status, Json(report.body(None, true))).into_response();
        if let AppError::Core(CoreError::RateLimit { retry_after }) = &self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
        }
        response.extensions_mut().insert(report);
        response
    }
}

/// Re-renders error bodies with the request id and, outside production, the
/// full error chain.
pub async fn error_envelope(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(req).await;
    if let Some(report) = response.extensions_mut().remove::<ErrorReport>() {
        let body = report.body(request_id.as_deref(), state.production);
        response.headers_mut().remove(header::CONTENT_LENGTH);
        *response.body_mut() = Body::from(body.to_string());
    }
    response
}
