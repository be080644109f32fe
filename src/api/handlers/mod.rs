//! Route handlers and shared validation helpers.
//!
//! Business logic stays thin here: the interesting work happens in the
//! pipeline before a request ever reaches these functions.

pub mod directory;
pub mod health;
pub mod login;
pub mod profile;
pub mod register;

use regex::Regex;

/// Normalize an email for lookup/uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
