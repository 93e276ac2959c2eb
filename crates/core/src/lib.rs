//! bsync-core: Core library for the bsync directory uploader
//!
//! This crate provides the core functionality for bsync, including:
//! - Configuration and alias management
//! - Path parsing
//! - Exclusion rules and directory scanning
//! - MD5/ETag change detection
//! - Sequential and pooled upload scheduling
//! - Single-object download
//!
//! Storage access goes through the [`ObjectStore`] trait, so the engine can
//! run against any backend or an in-memory fake.

pub mod alias;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod exclude;
pub mod observer;
pub mod options;
pub mod outcome;
pub mod path;
pub mod plan;
pub mod pool;
pub mod scan;
pub mod scheduler;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use alias::{Alias, AliasManager};
pub use config::{Config, ConfigManager};
pub use detect::ChangeDetector;
pub use engine::{Download, SyncEngine};
pub use error::{Error, Result};
pub use exclude::ExcludeRules;
pub use observer::{LogObserver, SyncEvent, SyncObserver};
pub use options::{CheckFailurePolicy, SyncOptions};
pub use outcome::OperationOutcome;
pub use path::{ParsedPath, RemotePath, parse_path};
pub use plan::{SyncPlan, UploadTask};
pub use scan::{ScanResult, TransferCandidate};
pub use scheduler::Scheduler;
pub use traits::ObjectStore;
