//! Gateway error types shared by the finder, transport, and render layers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Top-level error type returned from any stage of a render/find request.
///
/// Variants map directly onto the failure kinds: bad user input never
/// retries and surfaces as 400, backend failures surface as 500 (retries
/// are the caller's concern), and `InternalInvariant` marks a violated
/// post-condition that should never occur in practice.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed input: bad `from`/`until`, a quote in `target`, an
    /// unsupported glob, unbalanced `{`/`[`.
    #[error("{0}")]
    BadRequest(String),

    /// The backend transport could not be reached or returned a non-2xx
    /// response.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A backend SQL call exceeded its configured deadline.
    #[error("backend timeout")]
    BackendTimeout,

    /// The row-binary stream ended mid-record.
    #[error("truncated response from backend")]
    TruncatedResponse,

    /// Rollup rule set failed validation at load time (non-monotonic
    /// retentions).
    #[error("invalid rollup configuration: {0}")]
    RollupConfigInvalid(String),

    /// A post-condition the implementation relies on was violated.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Plain-text bodies only: the backend URL and SQL text must never
        // leak to a client, so every branch renders just the variant's
        // own message, never `{:?}` of an inner error.
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::BackendUnavailable(_) | Self::BackendTimeout => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::TruncatedResponse => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RollupConfigInvalid(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InternalInvariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
