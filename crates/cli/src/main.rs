//! bsync command-line entry point

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;

use bsync_core::ConfigManager;
use commands::Cli;
use output::OutputConfig;

/// Environment variable holding the log filter
const LOG_ENV: &str = "BSYNC_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    let output_config = apply_config_defaults(cli.output_config());
    let code = commands::execute(cli.command, output_config).await;

    std::process::exit(code.as_i32());
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Fill in output settings from the `[defaults]` section of the config file
///
/// Flags given on the command line always win.
fn apply_config_defaults(mut config: OutputConfig) -> OutputConfig {
    let defaults = match ConfigManager::new().and_then(|m| m.load()) {
        Ok(c) => c.defaults,
        Err(e) => {
            tracing::debug!(error = %e, "Config not loaded, using built-in output defaults");
            return config;
        }
    };

    if defaults.output == "json" {
        config.json = true;
    }

    match defaults.color.as_str() {
        "never" => config.no_color = true,
        "always" if !config.no_color => console::set_colors_enabled(true),
        _ => {}
    }

    config
}

