//! Result aggregation

use serde::Serialize;

use crate::error::{Error, Result};
use crate::plan::UploadTask;

/// Final tally of an upload operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// Unchanged files that did not need uploading
    pub skipped: usize,
    /// Files left out by exclusion rules
    pub excluded: usize,
    pub bytes_uploaded: u64,
}

impl OperationOutcome {
    /// Tally completed tasks
    pub fn from_tasks(tasks: &[UploadTask], excluded: usize) -> Self {
        let mut outcome = Self {
            excluded,
            ..Self::default()
        };

        for task in tasks {
            if task.is_failed() {
                outcome.failed += 1;
            } else if task.is_skipped() {
                outcome.skipped += 1;
            } else {
                outcome.succeeded += 1;
                outcome.bytes_uploaded += task.size;
            }
        }

        outcome
    }

    /// Number of tasks, i.e. non-excluded files
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// Tasks that went past the change check
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Aggregate error when any task failed
    pub fn aggregate_error(&self) -> Option<Error> {
        (self.failed > 0).then(|| Error::PartialFailure {
            failed: self.failed,
            attempted: self.attempted(),
        })
    }

    pub fn into_result(self) -> Result<Self> {
        match self.aggregate_error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}
