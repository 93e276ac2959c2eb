//! Upload operation options

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_WORKERS;
use crate::pool::effective_workers;

/// What to do with a file whose change check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckFailurePolicy {
    /// Record the error and count the file as failed without uploading it
    #[default]
    Fail,
    /// Warn and upload the file anyway
    Upload,
}

impl fmt::Display for CheckFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailurePolicy::Fail => write!(f, "fail"),
            CheckFailurePolicy::Upload => write!(f, "upload"),
        }
    }
}

impl FromStr for CheckFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(CheckFailurePolicy::Fail),
            "upload" => Ok(CheckFailurePolicy::Upload),
            _ => Err(format!("Invalid check failure policy: {s}")),
        }
    }
}

/// Parameters of one upload operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Exclusion rules, in evaluation order
    pub exclude: Vec<String>,
    /// Skip files whose remote ETag matches the local MD5
    pub incremental: bool,
    /// Use worker pools instead of uploading one file at a time
    pub concurrent: bool,
    /// Pool size in concurrent mode; 0 selects the default
    pub workers: usize,
    pub on_check_error: CheckFailurePolicy,
    /// Plan and check, but do not upload
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            incremental: false,
            concurrent: false,
            workers: DEFAULT_WORKERS,
            on_check_error: CheckFailurePolicy::default(),
            dry_run: false,
        }
    }
}

impl SyncOptions {
    pub fn worker_count(&self) -> usize {
        effective_workers(self.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SyncOptions::default();
        assert!(!options.incremental);
        assert!(!options.concurrent);
        assert_eq!(options.worker_count(), DEFAULT_WORKERS);
        assert_eq!(options.on_check_error, CheckFailurePolicy::Fail);
    }

    #[test]
    fn test_zero_workers_fall_back() {
        let options = SyncOptions {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(options.worker_count(), 10);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("fail".parse(), Ok(CheckFailurePolicy::Fail));
        assert_eq!("UPLOAD".parse(), Ok(CheckFailurePolicy::Upload));
        assert!("maybe".parse::<CheckFailurePolicy>().is_err());
        assert_eq!(CheckFailurePolicy::Upload.to_string(), "upload");
    }
}
