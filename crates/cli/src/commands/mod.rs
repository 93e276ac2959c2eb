//! Command-line interface definition and dispatch

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

pub mod alias;
pub mod download;
pub mod upload;

/// bsync - incremental, concurrent directory uploads to S3-compatible storage
#[derive(Parser, Debug)]
#[command(name = "bsync", version, about, long_about = None)]
pub struct Cli {
    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage storage endpoint aliases
    #[command(subcommand)]
    Alias(alias::AliasCommands),

    /// Upload a file or directory
    Upload(upload::UploadArgs),

    /// Download a single object
    Download(download::DownloadArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

impl Cli {
    /// Output settings from the global flags
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color,
            no_progress: self.no_progress,
            quiet: self.quiet,
        }
    }
}

/// Run the selected command
pub async fn execute(command: Commands, output_config: OutputConfig) -> ExitCode {
    match command {
        Commands::Alias(cmd) => alias::execute(cmd, output_config).await,
        Commands::Upload(args) => upload::execute(args, output_config).await,
        Commands::Download(args) => download::execute(args, output_config).await,
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "bsync",
                &mut std::io::stdout(),
            );
            ExitCode::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::try_parse_from([
            "bsync",
            "--json",
            "upload",
            "./site",
            "local/web/site",
            "-e",
            "node_modules/,*.log",
            "--exclude",
            ".git",
            "--incremental",
            "--concurrent",
            "--workers",
            "abc",
            "--on-check-error",
            "upload",
            "-n",
        ])
        .unwrap();

        assert!(cli.output_config().json);
        let Commands::Upload(args) = cli.command else {
            panic!("expected upload command");
        };
        assert_eq!(args.exclude, vec!["node_modules/,*.log", ".git"]);
        assert!(args.incremental);
        assert!(args.concurrent);
        assert_eq!(args.workers.as_deref(), Some("abc"));
        assert_eq!(
            args.on_check_error,
            bsync_core::CheckFailurePolicy::Upload
        );
        assert!(args.dry_run);
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from(["bsync", "download", "local/docs/a.pdf", "./out"]).unwrap();
        let Commands::Download(args) = cli.command else {
            panic!("expected download command");
        };
        assert_eq!(args.source, "local/docs/a.pdf");
        assert_eq!(args.target, std::path::PathBuf::from("./out"));
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        let result = Cli::try_parse_from([
            "bsync",
            "upload",
            ".",
            "a/b",
            "--on-check-error",
            "ignore",
        ]);
        assert!(result.is_err());
    }
}
