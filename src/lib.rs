//! Perimeter guards a user-account API: every inbound request passes an
//! ordered chain of origin validation (nonce + timestamp + HMAC signature),
//! per-client rate limiting, and bearer-token verification before it reaches
//! a handler.

pub mod api;
pub mod auth;
pub mod cli;
