use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("perimeter")
        .about("Request authentication perimeter for a user-account API")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PERIMETER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("origin-secret")
                .long("origin-secret")
                .help("Shared secret for the X-Client-Signature origin check (min 32 bytes)")
                .env("PERIMETER_ORIGIN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("Signing secret for session tokens (min 32 bytes)")
                .env("PERIMETER_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("nonce-window")
                .long("nonce-window")
                .help("Freshness window in seconds for nonces and timestamps")
                .default_value("300")
                .env("PERIMETER_NONCE_WINDOW")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("rate-capacity")
                .long("rate-capacity")
                .help("Maximum burst of requests per client on rate-limited paths")
                .default_value("5")
                .env("PERIMETER_RATE_CAPACITY")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("rate-refill")
                .long("rate-refill")
                .help("Tokens added back to each bucket per refill period")
                .default_value("5")
                .env("PERIMETER_RATE_REFILL")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("rate-period")
                .long("rate-period")
                .help("Refill period in seconds")
                .default_value("60")
                .env("PERIMETER_RATE_PERIOD")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("rate-limited-paths")
                .long("rate-limited-paths")
                .help("Comma separated path prefixes subject to rate limiting")
                .default_value("/api/user/register,/api/user/login")
                .env("PERIMETER_RATE_LIMITED_PATHS")
                .value_delimiter(','),
        )
        .arg(
            Arg::new("cors-origin")
                .long("cors-origin")
                .help("Frontend origin allowed by CORS, example: https://app.tld")
                .env("PERIMETER_CORS_ORIGIN"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PERIMETER_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
