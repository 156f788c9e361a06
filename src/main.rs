use clap::Parser;
use retrofit::cli::{handle_health, handle_run, handle_sanitize, CliArgs, Commands};
use retrofit::util::{init_logging, logging::parse_level, LoggingConfig};
use retrofit::{NAME, VERSION};
use std::env;
use std::process;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Run(run_args) => handle_run(run_args).await,
        Commands::Sanitize(sanitize_args) => handle_sanitize(sanitize_args).await,
        Commands::Health(health_args) => handle_health(health_args).await,
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("RETROFIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let use_json = args.log_json
        || env::var("RETROFIT_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..LoggingConfig::default()
    });
}
