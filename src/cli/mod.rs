pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, HealthArgs, OutputFormatArg, RunArgs, SanitizeArgs};
pub use handlers::{handle_health, handle_run, handle_sanitize};
pub use output::{ComponentHealth, HealthReport, OutputFormat, OutputFormatter};
