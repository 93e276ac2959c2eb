//! Change detection for incremental uploads
//!
//! A file needs uploading when the remote object is missing or its entity
//! tag differs from the MD5 of the local content.
//!
//! Entity tags of multipart uploads are not plain MD5 digests, so such
//! objects always compare as changed and get re-uploaded.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::traits::{ETAG_KEY, ObjectStore};

/// Compares local files with remote objects
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<dyn ObjectStore>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Decide whether `local_path` must be uploaded to `key`
    ///
    /// Errors mean the decision is unknown; they are never turned into a
    /// silent "unchanged".
    pub async fn needs_transfer(&self, local_path: &Path, key: &str) -> Result<bool> {
        let local_digest = file_md5(local_path).await?;

        let exists = self
            .store
            .object_exists(key)
            .await
            .map_err(|e| remote_check_error(key, "existence check", e))?;
        if !exists {
            tracing::debug!(key, "Remote object missing");
            return Ok(true);
        }

        let metadata = self
            .store
            .get_object_metadata(key)
            .await
            .map_err(|e| remote_check_error(key, "metadata fetch", e))?;

        let changed = match etag_from_metadata(&metadata) {
            Some(etag) => etag != local_digest,
            None => {
                tracing::debug!(key, "Remote object has no ETag, treating as changed");
                true
            }
        };

        tracing::debug!(key, local = %local_digest, changed, "Compared digest");
        Ok(changed)
    }
}

/// Compute the lower-case hex MD5 digest of a file
pub async fn file_md5(path: &Path) -> Result<String> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || md5_hex(&owned).map_err(|source| (owned, source)))
        .await
        .map_err(|e| Error::HashCompute {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?
        .map_err(|(path, source)| Error::HashCompute { path, source })
}

fn md5_hex(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Extract the entity tag from object metadata, without surrounding quotes
///
/// Header names are matched case-insensitively.
pub fn etag_from_metadata(metadata: &HashMap<String, String>) -> Option<String> {
    metadata
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(ETAG_KEY))
        .map(|(_, value)| strip_etag_quotes(value).to_string())
}

/// Remove the quote characters some stores wrap around entity tags
pub fn strip_etag_quotes(etag: &str) -> &str {
    etag.trim_matches('"')
}

fn remote_check_error(key: &str, what: &str, err: Error) -> Error {
    Error::RemoteCheck {
        key: key.to_string(),
        message: format!("{what}: {err}"),
    }
}
