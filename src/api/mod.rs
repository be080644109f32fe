//! HTTP surface: router wiring, middleware ordering, and server startup.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

use crate::auth::config::AuthConfig;

pub mod handlers;
pub mod pipeline;

use handlers::directory::InMemoryDirectory;
use pipeline::AuthState;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Build the application router around shared pipeline state.
///
/// The three checks are layered here and nowhere else, and they run in
/// declaration order: origin, then rate, then token. `/health` sits outside
/// the perimeter so probes need no signed headers.
#[must_use]
pub fn router(state: Arc<AuthState>) -> Router {
    let perimeter = Router::new()
        .route("/api/user/register", post(handlers::register::register))
        .route("/api/user/login", post(handlers::login::login))
        .route("/api/user/profile", get(handlers::profile::profile))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    pipeline::origin_check,
                ))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    pipeline::rate_check,
                ))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    pipeline::token_check,
                )),
        );

    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(perimeter)
        .layer(Extension(state))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, config: AuthConfig) -> Result<()> {
    let cors = match config.cors_origin() {
        Some(origin) => Some(cors_layer(origin)?),
        None => None,
    };

    let state = Arc::new(AuthState::new(
        config,
        Arc::new(InMemoryDirectory::default()),
    )?);

    let mut app = router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = allowed_origin(origin)?;
    Ok(CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-client-nonce"),
            HeaderName::from_static("x-client-timestamp"),
            HeaderName::from_static("x-client-signature"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(origin)))
}

fn allowed_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid CORS origin URL: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}
