use crate::auth::config::AuthConfig;
use crate::cli::actions::Action;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Build the server action from parsed arguments.
///
/// Secrets are validated here so a misconfigured deployment refuses to start
/// instead of serving traffic with no effective protection.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let origin_secret = matches
        .get_one::<String>("origin-secret")
        .map(|s| SecretString::from(s.clone()))
        .context("missing required argument: --origin-secret")?;

    let token_secret = matches
        .get_one::<String>("token-secret")
        .map(|s| SecretString::from(s.clone()))
        .context("missing required argument: --token-secret")?;

    let mut config = AuthConfig::new(origin_secret, token_secret);

    if let Some(window) = matches.get_one::<u64>("nonce-window") {
        config = config.with_nonce_window_seconds(*window);
    }
    if let Some(capacity) = matches.get_one::<u32>("rate-capacity") {
        config = config.with_bucket_capacity(*capacity);
    }
    if let Some(refill) = matches.get_one::<u32>("rate-refill") {
        config = config.with_refill_tokens(*refill);
    }
    if let Some(period) = matches.get_one::<u64>("rate-period") {
        config = config.with_refill_period_seconds(*period);
    }
    if let Some(paths) = matches.get_many::<String>("rate-limited-paths") {
        config = config.with_rate_limited_prefixes(paths.cloned().collect());
    }
    if let Some(origin) = matches.get_one::<String>("cors-origin") {
        config = config.with_cors_origin(origin.clone());
    }

    config.validate().context("invalid configuration")?;

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        config,
    })
}
