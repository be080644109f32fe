//! Keyed signatures over request metadata.
//!
//! Clients sign `nonce:timestamp` with the shared origin secret and send the
//! lowercase-hex digest in `X-Client-Signature`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self, nonce: &str, timestamp: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(nonce.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac
    }

    /// Compute the expected signature for a `nonce:timestamp` pair.
    #[must_use]
    pub fn sign(&self, nonce: &str, timestamp: &str) -> String {
        hex::encode(self.mac(nonce, timestamp).finalize().into_bytes())
    }

    /// Verify a client-supplied hex signature.
    ///
    /// The MAC comparison is constant-time; a hex string of the wrong shape
    /// fails without ever reaching the comparison.
    #[must_use]
    pub fn verify(&self, nonce: &str, timestamp: &str, signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        self.mac(nonce, timestamp).verify_slice(&provided).is_ok()
    }
}
