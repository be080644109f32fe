//! Request-authentication primitives.
//!
//! Each component owns its state exclusively and exposes only check/record
//! operations: the nonce guard and rate limiter never leak their maps, and
//! the token codec is stateless.

pub mod config;
pub mod error;
pub mod nonce;
pub mod rate_limit;
pub mod signature;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use nonce::{NonceGuard, OriginCheckOutcome};
pub use rate_limit::RateLimiter;
pub use signature::SignatureVerifier;
pub use token::{TokenClaims, TokenCodec, TokenError};

/// Minimum length in bytes for both shared secrets.
pub const MIN_SECRET_BYTES: usize = 32;
