//! Error taxonomy for the request pipeline.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Terminal pipeline failures. Each maps to the status the client sees;
/// token-verification failures are deliberately absent because they never
/// terminate a request (the request just proceeds unauthenticated).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing required headers")]
    MissingHeaders,
    #[error("Invalid header format")]
    MalformedRequest,
    #[error("Invalid request")]
    ReplayedNonce,
    #[error("Invalid request")]
    StaleTimestamp,
    #[error("Invalid request")]
    BadSignature,
    #[error("Too Many Requests")]
    RateLimitExceeded,
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeaders | Self::MalformedRequest => StatusCode::BAD_REQUEST,
            Self::ReplayedNonce | Self::StaleTimestamp | Self::BadSignature => {
                StatusCode::UNAUTHORIZED
            }
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
