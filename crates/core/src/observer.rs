//! Progress and result notifications
//!
//! The engine does not print anything itself. Front ends implement
//! [`SyncObserver`] to render events; [`LogObserver`] forwards them to
//! `tracing`.

use crate::error::Error;
use crate::outcome::OperationOutcome;

/// Something that happened during an upload operation
///
/// `worker` is set for events produced by a pool worker in concurrent mode.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    ScanComplete {
        tasks: usize,
        excluded: usize,
    },
    CheckStarted {
        tasks: usize,
    },
    Unchanged {
        key: &'a str,
        worker: Option<usize>,
    },
    CheckFailed {
        key: &'a str,
        error: &'a Error,
        worker: Option<usize>,
    },
    CheckComplete {
        to_upload: usize,
        unchanged: usize,
        failed: usize,
    },
    UploadStarted {
        tasks: usize,
        bytes: u64,
    },
    Uploaded {
        key: &'a str,
        size: u64,
        worker: Option<usize>,
    },
    /// Dry run: the file would have been uploaded
    WouldUpload {
        key: &'a str,
        size: u64,
    },
    UploadFailed {
        key: &'a str,
        error: &'a Error,
        worker: Option<usize>,
    },
    /// Periodic heartbeat while uploads are running
    Progress {
        completed: usize,
        total: usize,
    },
    Finished {
        outcome: &'a OperationOutcome,
    },
}

/// Receives [`SyncEvent`]s, possibly from several workers at once
pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent<'_>);
}

/// Observer that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SyncObserver for LogObserver {
    fn on_event(&self, event: &SyncEvent<'_>) {
        match event {
            SyncEvent::ScanComplete { tasks, excluded } => {
                tracing::info!(tasks, excluded, "Scanned files");
            }
            SyncEvent::CheckStarted { tasks } => {
                tracing::info!(tasks, "Checking for changes");
            }
            SyncEvent::Unchanged { key, worker } => {
                tracing::debug!(key, worker, "Unchanged, skipping");
            }
            SyncEvent::CheckFailed { key, error, worker } => {
                tracing::warn!(key, worker, error = %error, "Change check failed");
            }
            SyncEvent::CheckComplete {
                to_upload,
                unchanged,
                failed,
            } => {
                tracing::info!(to_upload, unchanged, failed, "Change check complete");
            }
            SyncEvent::UploadStarted { tasks, bytes } => {
                tracing::info!(tasks, bytes, "Uploading");
            }
            SyncEvent::Uploaded { key, size, worker } => {
                tracing::info!(key, size, worker, "Uploaded");
            }
            SyncEvent::WouldUpload { key, size } => {
                tracing::info!(key, size, "Would upload");
            }
            SyncEvent::UploadFailed { key, error, worker } => {
                tracing::error!(key, worker, error = %error, "Upload failed");
            }
            SyncEvent::Progress { completed, total } => {
                tracing::info!(completed, total, "Upload in progress");
            }
            SyncEvent::Finished { outcome } => {
                tracing::info!(
                    succeeded = outcome.succeeded,
                    failed = outcome.failed,
                    skipped = outcome.skipped,
                    excluded = outcome.excluded,
                    "Upload finished"
                );
            }
        }
    }
}
