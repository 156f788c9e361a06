//! Structured logging setup
//!
//! Initializes the `tracing` subscriber once per process: pretty console
//! output by default, JSON for production, filtered through `RUST_LOG` when it
//! is set and `retrofit=<level>` otherwise. Output goes to stderr so command
//! results on stdout stay machine readable.
//!
//! ```no_run
//! use retrofit::util::logging;
//!
//! logging::init_from_env();
//! tracing::info!(submission_id = "abc", "Starting modernization");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

const NOISY_CRATES: &[&str] = &["h2=warn", "hyper=warn", "reqwest=warn"];

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for this crate's events
    pub level: Level,

    /// JSON output for log aggregation
    pub use_json: bool,

    /// Include the module target (e.g. `retrofit::pipeline`)
    pub include_target: bool,

    /// Include file and line number
    pub include_location: bool,

    /// Include thread id and name
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    /// INFO level, pretty console output with targets, no locations or thread ids
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with locations and thread ids
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            ..Default::default()
        }
    }
}

/// Parses a log level, case-insensitively. Unknown names map to INFO.
///
/// ```
/// use retrofit::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("invalid"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Filter used when `RUST_LOG` is unset
fn default_directives(level: Level) -> Vec<Directive> {
    std::iter::once(format!("retrofit={}", level))
        .chain(NOISY_CRATES.iter().map(|d| d.to_string()))
        .filter_map(|d| d.parse().ok())
        .collect()
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    default_directives(level)
        .into_iter()
        .fold(EnvFilter::new(""), |filter, directive| filter.add_directive(directive))
}

/// Initializes logging. Calls after the first are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Initializes logging from `RETROFIT_LOG_LEVEL` and `RETROFIT_LOG_JSON`.
pub fn init_from_env() {
    let level_str = env::var("RETROFIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let use_json = env::var("RETROFIT_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level: parse_level(&level_str),
        use_json,
        ..Default::default()
    });
}
