//! download command - Fetch one object to a local file

use std::path::PathBuf;
use std::sync::Arc;

use bsync_core::{Download, ParsedPath, SyncEngine, parse_path};
use clap::Args;
use serde::Serialize;

use super::upload::connect;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Download a single object
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Object to download (alias/bucket/key)
    pub source: String,

    /// Local file, or an existing directory to download into
    pub target: PathBuf,
}

#[derive(Debug, Serialize)]
struct DownloadOutput {
    source: String,
    #[serde(flatten)]
    download: Download,
}

/// Execute the download command
pub async fn execute(args: DownloadArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let remote = match parse_path(&args.source) {
        Ok(ParsedPath::Remote(remote)) if !remote.key.is_empty() => remote,
        Ok(_) => {
            formatter.error(&format!(
                "Source must be an object path (alias/bucket/key): {}",
                args.source
            ));
            return ExitCode::UsageError;
        }
        Err(e) => {
            formatter.error(&format!("Invalid source path: {e}"));
            return ExitCode::UsageError;
        }
    };

    let client = match connect(&remote).await {
        Ok(c) => c,
        Err((code, message)) => {
            formatter.error(&message);
            return code;
        }
    };

    let engine = SyncEngine::new(Arc::new(client));
    let download = match engine.download(&remote.key, &args.target).await {
        Ok(d) => d,
        Err(e) => {
            formatter.error(&format!("Download failed: {e}"));
            return ExitCode::from(&e);
        }
    };

    if formatter.is_json() {
        formatter.json(&DownloadOutput {
            source: args.source,
            download,
        });
    } else {
        formatter.success(&format!(
            "Downloaded {} to {} ({})",
            formatter.style_path(&download.key),
            formatter.style_path(&download.path.display().to_string()),
            formatter.style_size(download.bytes)
        ));
    }

    ExitCode::Success
}
