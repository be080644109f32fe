use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::pipeline::{AuthState, AuthenticatedIdentity};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileResponse {
    pub email: String,
    pub display_name: String,
}

#[utoipa::path(
    get,
    path = "/api/user/profile",
    responses(
        (status = 200, description = "Profile of the authenticated user", body = ProfileResponse, content_type = "application/json"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "User no longer exists"),
    ),
    tag = "user"
)]
pub async fn profile(
    state: Extension<Arc<AuthState>>,
    identity: Option<Extension<AuthenticatedIdentity>>,
) -> Response {
    // The pipeline never rejects on token failures; requiring authentication
    // is this route's job, and it answers 401 consistently.
    let Some(Extension(identity)) = identity else {
        return (
            StatusCode::UNAUTHORIZED,
            "Authentication required".to_string(),
        )
            .into_response();
    };

    match state.directory().find(&identity.subject) {
        Some(user) => (
            StatusCode::OK,
            Json(ProfileResponse {
                email: user.email,
                display_name: user.display_name,
            }),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
    }
}
