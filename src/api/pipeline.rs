//! The ordered per-request decision chain.
//!
//! Every request walks origin check, then rate check, then token check, in
//! that order and in one place; no stage is registered dynamically. Origin
//! and rate failures are terminal. Token failures are not: the request
//! continues unauthenticated and protected handlers decide what that means.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::{
    config::AuthConfig,
    error::AuthError,
    nonce::{NonceGuard, OriginCheckOutcome},
    rate_limit::RateLimiter,
    signature::SignatureVerifier,
    token::TokenCodec,
};

use super::handlers::directory::UserDirectory;

/// Identity attached to request extensions after a successful token check.
/// Never persisted; consumed by downstream handlers only.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub subject: String,
}

/// Shared state for the pipeline: configuration plus the three components,
/// each owning its own map or secret.
pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    origin: NonceGuard,
    limiter: RateLimiter,
    directory: Arc<dyn UserDirectory>,
}

impl AuthState {
    /// Build the pipeline state, validating configuration first.
    ///
    /// # Errors
    /// Returns an error if the configuration fails validation (for example a
    /// short secret); the server must not start in that case.
    pub fn new(config: AuthConfig, directory: Arc<dyn UserDirectory>) -> anyhow::Result<Self> {
        config.validate()?;

        let codec = TokenCodec::new(config.token_secret().clone())?;
        let verifier = SignatureVerifier::new(config.origin_secret().clone());
        let origin = NonceGuard::new(verifier, config.nonce_window_seconds());
        let limiter = RateLimiter::new(
            config.bucket_capacity(),
            config.refill_tokens(),
            config.refill_period_seconds(),
            config.rate_limited_prefixes().to_vec(),
        );

        Ok(Self {
            config,
            codec,
            origin,
            limiter,
            directory,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub(crate) fn directory(&self) -> &dyn UserDirectory {
        self.directory.as_ref()
    }
}

/// Stage 1: reject replayed, stale, or forged requests before anything else
/// sees them.
pub async fn origin_check(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    #[cfg(feature = "test-bypass")]
    if is_trusted_test_client(request.headers()) {
        return next.run(request).await;
    }

    let nonce = header_string(request.headers(), "x-client-nonce");
    let timestamp = header_string(request.headers(), "x-client-timestamp");
    let signature = header_string(request.headers(), "x-client-signature");

    let (Some(nonce), Some(timestamp), Some(signature)) = (nonce, timestamp, signature) else {
        return AuthError::MissingHeaders.into_response();
    };

    match state.origin.check_and_consume(&nonce, &timestamp, &signature) {
        OriginCheckOutcome::Accepted => next.run(request).await,
        OriginCheckOutcome::Malformed => AuthError::MalformedRequest.into_response(),
        OriginCheckOutcome::Replayed => {
            warn!(nonce, "replayed nonce rejected");
            AuthError::ReplayedNonce.into_response()
        }
        OriginCheckOutcome::Stale => {
            debug!(timestamp, "stale timestamp rejected");
            AuthError::StaleTimestamp.into_response()
        }
        OriginCheckOutcome::BadSignature => {
            warn!("bad origin signature rejected");
            AuthError::BadSignature.into_response()
        }
    }
}

/// Stage 2: per-client token bucket over the configured path prefixes.
pub async fn rate_check(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.limiter.is_limited_path(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(&request);
    if state.limiter.try_consume(&key) {
        next.run(request).await
    } else {
        warn!(key, path = request.uri().path(), "rate limit exceeded");
        AuthError::RateLimitExceeded.into_response()
    }
}

/// Stage 3: verify an optional bearer token against the request's own
/// fingerprint and attach the identity on success. Never rejects.
pub async fn token_check(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return next.run(request).await;
    };
    let Some(fingerprint) = client_fingerprint(request.headers()) else {
        debug!("bearer token without a client fingerprint, proceeding unauthenticated");
        return next.run(request).await;
    };

    match state.codec.decode(&token) {
        Ok(claims) if state.codec.verify(&token, &claims.sub, &fingerprint) => {
            request
                .extensions_mut()
                .insert(AuthenticatedIdentity {
                    subject: claims.sub,
                });
        }
        Ok(_) => debug!("token expired or bound to another client, proceeding unauthenticated"),
        Err(err) => debug!(error = %err, "unparsable bearer token, proceeding unauthenticated"),
    }

    next.run(request).await
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Normalized client fingerprint: the trimmed `User-Agent`.
pub(crate) fn client_fingerprint(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Rate-limit key for a request: proxy headers first, then the peer address.
fn client_key(request: &Request) -> String {
    let headers = request.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return real_ip.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(feature = "test-bypass")]
const TRUSTED_TEST_AGENT: &str = "Postman";

/// Recognized automated-testing clients skip the origin check. Compiled out
/// of default builds; a runtime header match alone must never disable the
/// check in production.
#[cfg(feature = "test-bypass")]
fn is_trusted_test_client(headers: &HeaderMap) -> bool {
    headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|agent| agent.contains(TRUSTED_TEST_AGENT))
}
