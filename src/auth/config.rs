//! Startup-time configuration for the authentication perimeter.

use anyhow::{bail, Result};
use secrecy::{ExposeSecret, SecretString};

use super::MIN_SECRET_BYTES;

const DEFAULT_NONCE_WINDOW_SECONDS: u64 = 300;
const DEFAULT_BUCKET_CAPACITY: u32 = 5;
const DEFAULT_REFILL_TOKENS: u32 = 5;
const DEFAULT_REFILL_PERIOD_SECONDS: u64 = 60;
const DEFAULT_RATE_LIMITED_PREFIXES: &[&str] = &["/api/user/register", "/api/user/login"];

/// All knobs the perimeter needs, collected once and validated before the
/// server starts. Secrets stay wrapped in [`SecretString`] so they never show
/// up in debug output.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    origin_secret: SecretString,
    token_secret: SecretString,
    nonce_window_seconds: u64,
    bucket_capacity: u32,
    refill_tokens: u32,
    refill_period_seconds: u64,
    rate_limited_prefixes: Vec<String>,
    cors_origin: Option<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(origin_secret: SecretString, token_secret: SecretString) -> Self {
        Self {
            origin_secret,
            token_secret,
            nonce_window_seconds: DEFAULT_NONCE_WINDOW_SECONDS,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            refill_tokens: DEFAULT_REFILL_TOKENS,
            refill_period_seconds: DEFAULT_REFILL_PERIOD_SECONDS,
            rate_limited_prefixes: DEFAULT_RATE_LIMITED_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            cors_origin: None,
        }
    }

    #[must_use]
    pub fn with_nonce_window_seconds(mut self, seconds: u64) -> Self {
        self.nonce_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bucket_capacity(mut self, capacity: u32) -> Self {
        self.bucket_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_refill_tokens(mut self, tokens: u32) -> Self {
        self.refill_tokens = tokens;
        self
    }

    #[must_use]
    pub fn with_refill_period_seconds(mut self, seconds: u64) -> Self {
        self.refill_period_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limited_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.rate_limited_prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn with_cors_origin(mut self, origin: String) -> Self {
        self.cors_origin = Some(origin);
        self
    }

    /// Fail-fast validation, called once at startup.
    ///
    /// # Errors
    /// Returns an error if either secret is shorter than [`MIN_SECRET_BYTES`]
    /// or a rate/window value is zero.
    pub fn validate(&self) -> Result<()> {
        if self.origin_secret.expose_secret().len() < MIN_SECRET_BYTES {
            bail!("origin secret must be at least {MIN_SECRET_BYTES} bytes");
        }
        if self.token_secret.expose_secret().len() < MIN_SECRET_BYTES {
            bail!("token secret must be at least {MIN_SECRET_BYTES} bytes");
        }
        if self.nonce_window_seconds == 0 {
            bail!("nonce window must be greater than zero");
        }
        if self.bucket_capacity == 0 {
            bail!("bucket capacity must be greater than zero");
        }
        if self.refill_tokens == 0 || self.refill_period_seconds == 0 {
            bail!("refill rate must be greater than zero");
        }
        Ok(())
    }

    #[must_use]
    pub fn origin_secret(&self) -> &SecretString {
        &self.origin_secret
    }

    #[must_use]
    pub fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    #[must_use]
    pub fn nonce_window_seconds(&self) -> u64 {
        self.nonce_window_seconds
    }

    #[must_use]
    pub fn bucket_capacity(&self) -> u32 {
        self.bucket_capacity
    }

    #[must_use]
    pub fn refill_tokens(&self) -> u32 {
        self.refill_tokens
    }

    #[must_use]
    pub fn refill_period_seconds(&self) -> u64 {
        self.refill_period_seconds
    }

    #[must_use]
    pub fn rate_limited_prefixes(&self) -> &[String] {
        &self.rate_limited_prefixes
    }

    #[must_use]
    pub fn cors_origin(&self) -> Option<&str> {
        self.cors_origin.as_deref()
    }
}
