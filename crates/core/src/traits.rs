//! Storage abstraction used by the sync engine
//!
//! The engine never talks to an SDK directly. Backends implement
//! [`ObjectStore`] for a single bucket and are injected into
//! [`crate::SyncEngine`].

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Metadata key holding the entity tag of an object
pub const ETAG_KEY: &str = "ETag";

/// Operations the sync engine needs from an object store
///
/// Keys are bucket-relative and never start with `/`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `local_path` to `key`
    async fn put_object(&self, key: &str, local_path: &Path) -> Result<()>;

    /// Download the object at `key` into the file at `local_path`
    ///
    /// The file is replaced only once the whole body has arrived. Returns
    /// the number of bytes written.
    async fn get_object(&self, key: &str, local_path: &Path) -> Result<u64>;

    /// Check whether an object exists at `key`
    async fn object_exists(&self, key: &str) -> Result<bool>;

    /// Fetch the object's response headers (name to value)
    ///
    /// Implementations include an [`ETAG_KEY`] entry when the store
    /// reports one.
    async fn get_object_metadata(&self, key: &str) -> Result<HashMap<String, String>>;
}
