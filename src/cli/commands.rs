//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: validate and process every record in an input file
//! - validate: check an input file and report every problem

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bulkrun - sequential bulk processing for storefront records
#[derive(Parser, Debug)]
#[command(name = "bulkrun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every record in a JSON array file
    Run(RunArgs),

    /// Validate a JSON array file without processing it
    Validate {
        /// Path to a JSON file holding an array of records
        input: PathBuf,

        /// Field every record must carry (repeatable)
        #[arg(short = 'r', long = "require")]
        required: Vec<String>,
    },
}

/// Arguments for `bulkrun run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to a JSON file holding an array of records
    pub input: PathBuf,

    /// Shell command run once per record; the record is in $BULKRUN_ITEM
    #[arg(short = 'x', long)]
    pub command: String,

    /// Field every record must carry (repeatable)
    #[arg(short = 'r', long = "require")]
    pub required: Vec<String>,

    /// Retries per record after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Pause between records in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Exit code that fails a record without retrying (repeatable)
    #[arg(long = "terminal-exit-code")]
    pub terminal_exit_codes: Vec<i32>,

    /// Write the final run snapshot as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Commands::Run(args) => args,
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["bulkrun"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["bulkrun", "-v", "validate", "items.json"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["bulkrun", "validate", "items.json", "-c", "/path/to/bulkrun.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/bulkrun.yml")));
    }

    #[test]
    fn test_run_minimal() {
        let cli = Cli::try_parse_from(["bulkrun", "run", "items.json", "--command", "true"]).unwrap();
        let args = run_args(cli);
        assert_eq!(args.input, PathBuf::from("items.json"));
        assert_eq!(args.command, "true");
        assert!(args.required.is_empty());
        assert!(args.max_retries.is_none());
        assert!(args.timeout_ms.is_none());
        assert!(args.delay_ms.is_none());
        assert!(args.terminal_exit_codes.is_empty());
        assert!(args.report.is_none());
    }

    #[test]
    fn test_run_all_options() {
        let cli = Cli::try_parse_from([
            "bulkrun",
            "run",
            "items.json",
            "-x",
            "./publish.sh",
            "-r",
            "sku",
            "--require",
            "barcode",
            "--max-retries",
            "0",
            "--timeout-ms",
            "500",
            "--delay-ms",
            "0",
            "--terminal-exit-code",
            "3",
            "--terminal-exit-code",
            "4",
            "--report",
            "out.json",
        ])
        .unwrap();
        let args = run_args(cli);
        assert_eq!(args.command, "./publish.sh");
        assert_eq!(args.required, vec!["sku".to_string(), "barcode".to_string()]);
        assert_eq!(args.max_retries, Some(0));
        assert_eq!(args.timeout_ms, Some(500));
        assert_eq!(args.delay_ms, Some(0));
        assert_eq!(args.terminal_exit_codes, vec![3, 4]);
        assert_eq!(args.report, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_run_requires_command() {
        assert!(Cli::try_parse_from(["bulkrun", "run", "items.json"]).is_err());
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::try_parse_from(["bulkrun", "validate", "items.json", "-r", "sku"]).unwrap();
        match cli.command {
            Commands::Validate { input, required } => {
                assert_eq!(input, PathBuf::from("items.json"));
                assert_eq!(required, vec!["sku".to_string()]);
            }
            _ => panic!("Expected validate command"),
        }
    }

    #[test]
    fn test_help_works() {
        // Verify help doesn't panic
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["bulkrun", "--version"]);
        // Version flag causes early exit with error (expected)
        assert!(result.is_err());
    }
}
