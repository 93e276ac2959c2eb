//! Upload planning
//!
//! Turns scan candidates into upload tasks. In incremental mode the
//! transfer decision is deferred to the scheduler so hash checks can run in
//! parallel.

use std::path::PathBuf;

use crate::error::Error;
use crate::scan::{ScanResult, TransferCandidate};

/// One file to (maybe) upload
#[derive(Debug)]
pub struct UploadTask {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub size: u64,
    /// Cleared by the change detector when the remote copy is current
    pub needs_transfer: bool,
    pub needs_hash_check: bool,
    /// Last per-task error, set by the check or the upload
    pub error: Option<Error>,
}

impl UploadTask {
    pub fn new(candidate: TransferCandidate, incremental: bool) -> Self {
        Self {
            local_path: candidate.local_path,
            remote_key: candidate.remote_key,
            size: candidate.size,
            needs_transfer: true,
            needs_hash_check: incremental,
            error: None,
        }
    }

    /// The scan candidate this task was built from
    pub fn candidate(&self) -> TransferCandidate {
        TransferCandidate {
            local_path: self.local_path.clone(),
            remote_key: self.remote_key.clone(),
            size: self.size,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Unchanged on the remote side and not failed
    pub fn is_skipped(&self) -> bool {
        !self.needs_transfer && self.error.is_none()
    }

    /// Whether the upload phase should pick this task up
    pub fn ready_for_upload(&self) -> bool {
        self.needs_transfer && self.error.is_none()
    }
}

/// Tasks for one operation plus the exclusion count from the scan
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub tasks: Vec<UploadTask>,
    pub excluded: usize,
}

impl SyncPlan {
    pub fn new(scan: ScanResult, incremental: bool) -> Self {
        Self {
            tasks: plan(scan.candidates, incremental),
            excluded: scan.excluded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Files visited by the scan, excluded or not
    pub fn total_files(&self) -> usize {
        self.tasks.len() + self.excluded
    }

    pub fn total_bytes(&self) -> u64 {
        self.tasks.iter().map(|t| t.size).sum()
    }
}

/// Build one task per candidate
pub fn plan(candidates: Vec<TransferCandidate>, incremental: bool) -> Vec<UploadTask> {
    candidates
        .into_iter()
        .map(|c| UploadTask::new(c, incremental))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(key: &str) -> TransferCandidate {
        TransferCandidate {
            local_path: PathBuf::from(format!("/src/{key}")),
            remote_key: key.to_string(),
            size: 10,
        }
    }

    #[test]
    fn test_plan_full_upload() {
        let tasks = plan(vec![candidate("a"), candidate("b")], false);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.needs_transfer && !t.needs_hash_check));
        assert!(tasks.iter().all(UploadTask::ready_for_upload));
    }

    #[test]
    fn test_plan_incremental_defers_decision() {
        let tasks = plan(vec![candidate("a")], true);
        assert!(tasks[0].needs_hash_check);
        assert!(tasks[0].needs_transfer);
        assert!(tasks[0].error.is_none());
    }

    #[test]
    fn test_sync_plan_counts() {
        let scan = ScanResult {
            candidates: vec![candidate("a"), candidate("b"), candidate("c")],
            excluded: 2,
        };
        let plan = SyncPlan::new(scan, false);
        assert_eq!(plan.tasks.len(), 3);
        assert_eq!(plan.excluded, 2);
        assert_eq!(plan.total_files(), 5);
        assert_eq!(plan.total_bytes(), 30);
    }

    #[test]
    fn test_task_states() {
        let mut task = UploadTask::new(candidate("a"), true);
        task.needs_transfer = false;
        assert!(task.is_skipped());
        assert!(!task.ready_for_upload());

        task.error = Some(Error::General("boom".to_string()));
        assert!(task.is_failed());
        assert!(!task.is_skipped());
    }
}
