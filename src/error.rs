use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Request-level failures for the search/caching surface. Nothing here is
/// fatal to the app: the worst case is "search temporarily unavailable".
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Admission denied by the rate limiter; `reset_at` is the unix timestamp
    /// at which the caller's window expires.
    #[error("Rate limit exceeded")]
    RateLimited { reset_at: i64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Food data provider is not configured")]
    ProviderUnavailable,

    /// The provider answered with a non-success status (passed through) or the
    /// call failed at the transport level (`status` is None, reported as 502).
    #[error("Food data provider request failed")]
    Upstream { status: Option<u16> },

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::RateLimited { reset_at } => {
                let mut headers = HeaderMap::new();
                headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
                if let Ok(value) = reset_at.to_string().parse() {
                    headers.insert("X-RateLimit-Reset", value);
                }
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    headers,
                    "Rate limit exceeded",
                )
                    .into_response()
            }
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{what} not found")).into_response()
            }
            ApiError::ProviderUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Food data provider is not configured",
            )
                .into_response(),
            ApiError::Upstream { status } => {
                let status = status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (status, "Food data provider request failed").into_response()
            }
            ApiError::Internal(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}
