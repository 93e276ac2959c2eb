//! upload command - Upload a local file or directory tree
//!
//! Walks the local directory, applies exclusion rules and uploads every
//! remaining file under the target prefix, optionally skipping files whose
//! remote ETag matches the local MD5.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bsync_core::config::DEFAULT_WORKERS;
use bsync_core::{
    AliasManager, CheckFailurePolicy, ConfigManager, ExcludeRules, OperationOutcome, ParsedPath,
    RemotePath, SyncEngine, SyncEvent, SyncObserver, SyncOptions, parse_path,
};
use bsync_s3::S3Client;
use clap::Args;
use jiff::Timestamp;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, UploadProgress};

/// Upload a local file or directory to object storage
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local file or directory
    pub source: PathBuf,

    /// Destination (alias/bucket[/prefix])
    pub target: String,

    /// Exclusion rules, comma separated; may be repeated
    ///
    /// `dir/` excludes a subtree, `dir/*` the files directly in `dir`,
    /// `*.log` any matching file, `/abs/path` an absolute prefix. Other
    /// rules must match the relative path exactly.
    #[arg(short, long, value_name = "RULES")]
    pub exclude: Vec<String>,

    /// Skip files whose content is unchanged (MD5 vs remote ETag)
    #[arg(short, long)]
    pub incremental: bool,

    /// Check and upload files with worker pools
    #[arg(short, long)]
    pub concurrent: bool,

    /// Number of workers per pool in concurrent mode
    #[arg(short, long, value_name = "N")]
    pub workers: Option<String>,

    /// What to do when a change check fails: fail or upload
    #[arg(long, value_name = "POLICY", default_value = "fail")]
    pub on_check_error: CheckFailurePolicy,

    /// Show what would be uploaded without uploading
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct UploadOutput {
    source: String,
    target: String,
    dry_run: bool,
    started_at: Timestamp,
    elapsed_secs: f64,
    #[serde(flatten)]
    outcome: OperationOutcome,
    failures: Vec<FailureInfo>,
}

#[derive(Debug, Clone, Serialize)]
struct FailureInfo {
    key: String,
    stage: &'static str,
    error: String,
}

/// Execute the upload command
pub async fn execute(args: UploadArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let remote = match parse_path(&args.target) {
        Ok(ParsedPath::Remote(remote)) => remote,
        Ok(ParsedPath::Local(_)) => {
            formatter.error(&format!(
                "Target must be a remote path (alias/bucket[/prefix]): {}",
                args.target
            ));
            return ExitCode::UsageError;
        }
        Err(e) => {
            formatter.error(&format!("Invalid target path: {e}"));
            return ExitCode::UsageError;
        }
    };

    let config = match ConfigManager::new().and_then(|m| m.load()) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load config: {e}"));
            return ExitCode::GeneralError;
        }
    };

    let workers = match parse_workers(args.workers.as_deref(), config.defaults.workers) {
        Ok(n) => n,
        Err(warning) => {
            formatter.warning(&warning);
            DEFAULT_WORKERS
        }
    };

    let mut exclude = config.defaults.exclude.clone();
    for value in &args.exclude {
        exclude.extend(ExcludeRules::parse_list(value));
    }

    let options = SyncOptions {
        exclude,
        incremental: args.incremental,
        concurrent: args.concurrent,
        workers,
        on_check_error: args.on_check_error,
        dry_run: args.dry_run,
    };

    let client = match connect(&remote).await {
        Ok(c) => c,
        Err((code, message)) => {
            formatter.error(&message);
            return code;
        }
    };

    let observer = Arc::new(CliObserver::new(formatter.clone(), args.on_check_error));
    let engine = SyncEngine::new(Arc::new(client)).with_observer(observer.clone());

    let started_at = Timestamp::now();
    let result = engine.upload(&args.source, &remote.key, &options).await;
    observer.progress.finish();
    let elapsed_secs = Timestamp::now().duration_since(started_at).as_secs_f64();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            formatter.error(&format!("Upload failed: {e}"));
            return ExitCode::from(&e);
        }
    };

    if formatter.is_json() {
        formatter.json(&UploadOutput {
            source: args.source.display().to_string(),
            target: args.target.clone(),
            dry_run: args.dry_run,
            started_at,
            elapsed_secs,
            outcome,
            failures: observer.failures(),
        });
    } else {
        print_summary(&formatter, &outcome, args.dry_run, elapsed_secs);
    }

    match outcome.aggregate_error() {
        Some(e) => {
            formatter.error(&e.to_string());
            ExitCode::from(&e)
        }
        None => ExitCode::Success,
    }
}

pub(super) async fn connect(remote: &RemotePath) -> Result<S3Client, (ExitCode, String)> {
    let alias_manager = AliasManager::new().map_err(|e| {
        (
            ExitCode::GeneralError,
            format!("Failed to load aliases: {e}"),
        )
    })?;

    let alias = alias_manager.get(&remote.alias).map_err(|_| {
        (
            ExitCode::NotFound,
            format!("Alias '{}' not found", remote.alias),
        )
    })?;

    S3Client::new(&alias, &remote.bucket).await.map_err(|e| {
        (
            ExitCode::from(&e),
            format!("Failed to create client: {e}"),
        )
    })
}

/// Parse the `--workers` value
///
/// `None` selects the configured default. Anything that is not a positive
/// integer is rejected with a warning message for the caller to print.
fn parse_workers(value: Option<&str>, configured: usize) -> Result<usize, String> {
    let Some(value) = value else {
        return Ok(if configured == 0 {
            DEFAULT_WORKERS
        } else {
            configured
        });
    };

    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!(
            "Invalid worker count '{value}', using default ({DEFAULT_WORKERS})"
        )),
    }
}

fn print_summary(formatter: &Formatter, outcome: &OperationOutcome, dry_run: bool, secs: f64) {
    formatter.println("");
    let verb = if dry_run { "would upload" } else { "uploaded" };
    formatter.println(&format!(
        "Upload complete in {secs:.1}s: {} {verb} ({}), {} unchanged, {} excluded, {} failed",
        outcome.succeeded,
        formatter.style_size(outcome.bytes_uploaded),
        outcome.skipped,
        outcome.excluded,
        outcome.failed
    ));
}

/// Renders engine events for the terminal and records failures
///
/// Under [`CheckFailurePolicy::Upload`] a failed check is only a warning:
/// the file is still uploaded and any upload error is recorded on its own.
struct CliObserver {
    formatter: Formatter,
    progress: UploadProgress,
    policy: CheckFailurePolicy,
    failures: Mutex<Vec<FailureInfo>>,
}

impl CliObserver {
    fn new(formatter: Formatter, policy: CheckFailurePolicy) -> Self {
        let progress = UploadProgress::new(formatter.config().show_progress());
        Self {
            formatter,
            progress,
            policy,
            failures: Mutex::new(Vec::new()),
        }
    }

    fn failures(&self) -> Vec<FailureInfo> {
        self.failures
            .lock()
            .map(|f| f.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    fn record_failure(&self, key: &str, stage: &'static str, error: &bsync_core::Error) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.push(FailureInfo {
            key: key.to_string(),
            stage,
            error: error.to_string(),
        });
    }

    fn line(&self, message: &str) {
        self.progress.suspend(|| self.formatter.println(message));
    }
}

impl SyncObserver for CliObserver {
    fn on_event(&self, event: &SyncEvent<'_>) {
        let f = &self.formatter;
        match event {
            SyncEvent::ScanComplete { tasks, excluded } => {
                self.line(&format!("Found {tasks} files ({excluded} excluded)"));
            }
            SyncEvent::CheckStarted { tasks } => {
                self.line(&format!("Checking {tasks} files for changes..."));
            }
            SyncEvent::Unchanged { key, .. } => {
                self.line(&f.style_detail(&format!("= {key} (unchanged)")));
            }
            SyncEvent::CheckFailed { key, error, .. } => {
                if self.policy == CheckFailurePolicy::Fail {
                    self.record_failure(key, "check", error);
                }
                self.progress
                    .suspend(|| f.warning(&format!("Could not check {key}: {error}")));
            }
            SyncEvent::CheckComplete {
                to_upload,
                unchanged,
                failed,
            } => {
                self.line(&format!(
                    "{to_upload} to upload, {unchanged} unchanged, {failed} check failures"
                ));
            }
            SyncEvent::UploadStarted { tasks, bytes } => {
                self.line(&format!("Uploading {tasks} files ({})", f.style_size(*bytes)));
                self.progress.start(*tasks);
            }
            SyncEvent::Uploaded { key, size, .. } => {
                self.line(&format!("+ {} ({})", f.style_path(key), f.style_size(*size)));
                self.progress.inc();
            }
            SyncEvent::WouldUpload { key, size } => {
                self.line(&format!(
                    "would upload {} ({})",
                    f.style_path(key),
                    f.style_size(*size)
                ));
                self.progress.inc();
            }
            SyncEvent::UploadFailed { key, error, .. } => {
                self.record_failure(key, "upload", error);
                self.progress
                    .suspend(|| f.error(&format!("Failed to upload {key}: {error}")));
                self.progress.inc();
            }
            SyncEvent::Progress { completed, total } => {
                if !self.progress.is_active() {
                    self.line(&f.style_detail(&format!("Progress: {completed}/{total}")));
                }
            }
            SyncEvent::Finished { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers(Some("4"), 10), Ok(4));
        assert_eq!(parse_workers(Some(" 16 "), 10), Ok(16));
        assert_eq!(parse_workers(None, 6), Ok(6));
        assert_eq!(parse_workers(None, 0), Ok(DEFAULT_WORKERS));
        assert!(parse_workers(Some("0"), 10).is_err());
        assert!(parse_workers(Some("-3"), 10).is_err());
        assert!(parse_workers(Some("many"), 10).is_err());
    }

    fn json_observer(policy: CheckFailurePolicy) -> CliObserver {
        let formatter = Formatter::new(OutputConfig {
            json: true,
            ..Default::default()
        });
        CliObserver::new(formatter, policy)
    }

    #[test]
    fn test_observer_records_failures() {
        let observer = json_observer(CheckFailurePolicy::Fail);
        let error = bsync_core::Error::Transfer {
            key: "p/a".to_string(),
            message: "reset".to_string(),
        };
        observer.on_event(&SyncEvent::UploadFailed {
            key: "p/a",
            error: &error,
            worker: Some(0),
        });

        let failures = observer.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].key, "p/a");
        assert_eq!(failures[0].stage, "upload");
    }

    #[test]
    fn test_check_failure_recorded_only_when_fatal() {
        let error = bsync_core::Error::RemoteCheck {
            key: "p/a".to_string(),
            message: "timeout".to_string(),
        };
        let event = SyncEvent::CheckFailed {
            key: "p/a",
            error: &error,
            worker: None,
        };

        let fail = json_observer(CheckFailurePolicy::Fail);
        fail.on_event(&event);
        assert_eq!(fail.failures().len(), 1);
        assert_eq!(fail.failures()[0].stage, "check");

        let upload = json_observer(CheckFailurePolicy::Upload);
        upload.on_event(&event);
        assert!(upload.failures().is_empty());
    }

    #[test]
    fn test_upload_output_flattens_outcome() {
        let output = UploadOutput {
            source: "./site".to_string(),
            target: "local/bucket/site".to_string(),
            dry_run: false,
            started_at: Timestamp::UNIX_EPOCH,
            elapsed_secs: 0.5,
            outcome: OperationOutcome {
                succeeded: 2,
                ..Default::default()
            },
            failures: Vec::new(),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["succeeded"], 2);
        assert_eq!(json["failed"], 0);
        assert_eq!(json["started_at"], "1970-01-01T00:00:00Z");
        assert!(json["failures"].as_array().unwrap().is_empty());
    }
}
