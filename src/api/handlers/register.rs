use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

use super::{directory::RegisterOutcome, normalize_email, valid_email};
use crate::api::pipeline::AuthState;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    email: String,
    display_name: Option<String>,
    password: String,
}

#[utoipa::path(
    post,
    path = "/api/user/register",
    responses(
        (status = 201, description = "Registration successful"),
        (status = 400, description = "Missing or invalid payload"),
        (status = 409, description = "User with the specified email already exists"),
    ),
    tag = "user"
)]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string());
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string());
    }
    if payload.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing password".to_string());
    }

    let display_name = payload.display_name.unwrap_or_else(|| email.clone());

    match state
        .directory()
        .register(&email, &display_name, &payload.password)
    {
        RegisterOutcome::Created => {
            debug!(email, "user registered");
            (StatusCode::CREATED, "Created".to_string())
        }
        RegisterOutcome::Duplicate => (StatusCode::CONFLICT, "User already exists".to_string()),
    }
}
