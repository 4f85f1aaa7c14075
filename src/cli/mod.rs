//! CLI module for Cairn
//!
//! Provides command-line interface parsing and handling for the cairn-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod inspect;
pub mod output;
pub mod refresh;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cairn - cited answers from scraped sources
#[derive(Parser, Debug)]
#[command(
    name = "cairn-server",
    version,
    about = "Cairn - retrieval augmented answers with citations",
    long_about = "Scrapes configured sources into a vector index and answers questions\n\
                  with a local language model, citing the passages it used.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  cairn-server                      # Start the server (reads cairn.toml)\n    \
                  cairn-server --config my.toml     # Use a custom config file\n    \
                  cairn-server refresh              # Re-ingest every [[sources]] entry\n    \
                  cairn-server config --validate    # Check the configuration\n    \
                  cairn-server audit --tail 20      # Show recent audit entries"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "cairn.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Post every configured source to a running backend's /ingest
    Refresh {
        /// Base URL of the backend (defaults to the configured host and port)
        #[arg(long, env = "CAIRN_BACKEND_URL")]
        backend_url: Option<String>,
    },

    /// Show configuration information
    Config {
        /// Only validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        tail: usize,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run, `serve` when none was given
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::try_parse_from(["cairn-server"]).unwrap();
        assert_eq!(cli.command(), &Commands::Serve);
        assert_eq!(cli.config, PathBuf::from("cairn.toml"));
    }

    #[test]
    fn test_parse_refresh() {
        let cli = Cli::try_parse_from([
            "cairn-server",
            "--no-color",
            "refresh",
            "--backend-url",
            "http://backend:8000",
        ])
        .unwrap();

        assert!(cli.no_color);
        assert_eq!(
            cli.command(),
            &Commands::Refresh {
                backend_url: Some("http://backend:8000".to_string())
            }
        );
    }

    #[test]
    fn test_parse_audit_tail() {
        let cli = Cli::try_parse_from(["cairn-server", "audit", "-n", "5", "-c", "x.toml"]).unwrap();
        assert_eq!(cli.command(), &Commands::Audit { tail: 5 });
        assert_eq!(cli.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from(["cairn-server", "config", "--validate"]).unwrap();
        assert_eq!(cli.command(), &Commands::Config { validate: true });
    }
}
