use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::normalize_email;
use crate::api::pipeline::{client_fingerprint, AuthState};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/api/user/login",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload or client fingerprint"),
        (status = 401, description = "Invalid credentials"),
    ),
    tag = "user"
)]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    // Tokens are bound to the fingerprint presented at login; without one
    // there is nothing to bind to.
    let Some(fingerprint) = client_fingerprint(&headers) else {
        return (StatusCode::BAD_REQUEST, "Missing User-Agent".to_string()).into_response();
    };

    let email = normalize_email(&payload.email);
    let Some(user) = state
        .directory()
        .verify_credentials(&email, &payload.password)
    else {
        return (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()).into_response();
    };

    match state.codec().issue(&user.email, &fingerprint) {
        Ok(token) => (StatusCode::OK, Json(LoginResponse { token })).into_response(),
        Err(err) => {
            error!(error = %err, "failed to issue session token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to issue token".to_string(),
            )
                .into_response()
        }
    }
}
