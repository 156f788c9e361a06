use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Self-healing legacy code modernization
#[derive(Parser, Debug)]
#[command(
    name = "retrofit",
    about = "Redact, analyze, rewrite and verify legacy Python code",
    version,
    author,
    long_about = "retrofit sanitizes an uploaded legacy code archive, asks a generative \
                  model to analyze and rewrite its primary source file, and verifies the \
                  rewrite with a container build, retrying with the failure folded back \
                  into the prompt."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the modernization pipeline on an upload",
        long_about = "Materializes the upload (.zip or .tar.gz/.tgz archive, single file or directory), \
                      redacts secrets, analyzes and rewrites the primary Python file and \
                      verifies the result.\n\n\
                      Examples:\n  \
                      retrofit run legacy.zip\n  \
                      retrofit run app.py --verify await --max-iterations 5\n  \
                      retrofit run project/ --format json"
    )]
    Run(RunArgs),

    #[command(
        about = "Redact secrets from a directory in place",
        long_about = "Deletes version-control metadata, virtual environments, caches and \
                      credential files, then replaces detected secrets in text files.\n\n\
                      Examples:\n  \
                      retrofit sanitize ./checkout"
    )]
    Sanitize(SanitizeArgs),

    #[command(
        about = "Show which generative and build backends would be used",
        long_about = "Reports the generative strategy the configuration selects and whether \
                      build verification is real or simulated.\n\n\
                      Examples:\n  \
                      retrofit health\n  \
                      retrofit health --format json"
    )]
    Health(HealthArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(value_name = "UPLOAD", help = "Archive, source file or directory to modernize")]
    pub upload: PathBuf,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,

    #[arg(long, value_name = "N", help = "Self-healing iteration budget")]
    pub max_iterations: Option<u32>,

    #[arg(long, value_name = "POLICY", help = "Verification policy: advisory or await")]
    pub verify: Option<String>,

    #[arg(long, value_name = "DIR", help = "Directory for stored artifacts")]
    pub storage_dir: Option<PathBuf>,

    #[arg(long, help = "Ignore configured backends and use the built-in simulator")]
    pub simulate: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SanitizeArgs {
    #[arg(value_name = "PATH", help = "Directory to sanitize in place")]
    pub path: PathBuf,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let args = CliArgs::try_parse_from([
            "retrofit",
            "run",
            "legacy.tar.gz",
            "--verify",
            "await",
            "--max-iterations",
            "5",
            "-f",
            "json",
        ])
        .unwrap();

        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.upload, PathBuf::from("legacy.tar.gz"));
                assert_eq!(run.verify.as_deref(), Some("await"));
                assert_eq!(run.max_iterations, Some(5));
                assert_eq!(run.format, OutputFormatArg::Json);
                assert!(!run.simulate);
            }
            other => panic!("Expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let args = CliArgs::try_parse_from(["retrofit", "health", "-v"]).unwrap();
        assert!(args.verbose);
        assert!(matches!(args.command, Commands::Health(_)));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["retrofit", "-q", "-v", "health"]).is_err());
    }

    #[test]
    fn test_sanitize_requires_path() {
        assert!(CliArgs::try_parse_from(["retrofit", "sanitize"]).is_err());
    }
}
