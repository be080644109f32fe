//! Session token issuance and verification.
//!
//! Tokens are compact HS256 JWTs binding a subject (normalized email) to a
//! client fingerprint. They are never stored server-side; verification is a
//! pure function of the token, the secret, and the clock.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use super::MIN_SECRET_BYTES;

type HmacSha256 = Hmac<Sha256>;

/// Tokens expire 30 days after issuance and are never revoked early.
pub const SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject identity, a normalized email.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Client fingerprint the token is bound to.
    pub fp: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(0))
}

pub struct TokenCodec {
    secret: SecretString,
}

impl TokenCodec {
    /// Build a codec over the signing secret.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the secret is shorter than the minimum.
    pub fn new(secret: SecretString) -> Result<Self, TokenError> {
        if secret.expose_secret().len() < MIN_SECRET_BYTES {
            return Err(TokenError::InvalidInput("signing secret too short"));
        }
        Ok(Self { secret })
    }

    fn mac(&self, signing_input: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(signing_input.as_bytes());
        mac
    }

    /// Issue a token for `subject` bound to `fingerprint`, expiring in 30 days.
    ///
    /// # Errors
    /// Returns `InvalidInput` if subject or fingerprint is empty.
    pub fn issue(&self, subject: &str, fingerprint: &str) -> Result<String, TokenError> {
        self.issue_at(subject, fingerprint, unix_now())
    }

    /// Issue with an explicit clock, exposed for deterministic tests.
    ///
    /// # Errors
    /// Returns `InvalidInput` if subject or fingerprint is empty.
    pub fn issue_at(
        &self,
        subject: &str,
        fingerprint: &str,
        now_unix_seconds: i64,
    ) -> Result<String, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::InvalidInput("subject cannot be empty"));
        }
        if fingerprint.is_empty() {
            return Err(TokenError::InvalidInput("fingerprint cannot be empty"));
        }

        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now_unix_seconds,
            exp: now_unix_seconds + SESSION_TTL_SECONDS,
            fp: fingerprint.to_string(),
        };

        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        let tag = self.mac(&signing_input).finalize().into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&tag);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Decode and authenticate a token without checking expiry.
    ///
    /// Callers that need the expiry semantics use [`Self::verify`]; this exists
    /// so "unparsable" can be told apart from "expired or mismatched".
    ///
    /// # Errors
    /// Returns an error if the structure, encoding, algorithm, or signature
    /// is invalid.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        if parts.next().is_some() {
            return Err(TokenError::TokenFormat);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature =
            Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        // verify_slice is constant-time over the tag bytes.
        self.mac(&signing_input)
            .verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        b64d_json(claims_b64)
    }

    /// Verify a token against the expected subject and fingerprint.
    ///
    /// Fails closed: any parse error, signature mismatch, claim mismatch, or
    /// expiry in the past yields `false`.
    #[must_use]
    pub fn verify(&self, token: &str, subject: &str, fingerprint: &str) -> bool {
        self.verify_at(token, subject, fingerprint, unix_now())
    }

    /// Verify with an explicit clock, exposed for deterministic tests.
    ///
    /// A token whose `exp` equals `now` is still valid; it only becomes
    /// invalid once strictly past expiry.
    #[must_use]
    pub fn verify_at(
        &self,
        token: &str,
        subject: &str,
        fingerprint: &str,
        now_unix_seconds: i64,
    ) -> bool {
        match self.decode(token) {
            Ok(claims) => {
                claims.sub == subject && claims.fp == fingerprint && claims.exp >= now_unix_seconds
            }
            Err(_) => false,
        }
    }
}
