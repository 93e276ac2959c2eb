//! Path parsing
//!
//! Command-line paths are either local filesystem paths or remote paths of
//! the form `alias/bucket[/key]`.

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// A location inside a bucket reachable through an alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub alias: String,
    pub bucket: String,
    /// Key or key prefix inside the bucket, without a leading slash
    pub key: String,
}

impl RemotePath {
    pub fn new(alias: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// True when the key addresses a "directory" (empty or ending in `/`)
    pub fn is_prefix(&self) -> bool {
        self.key.is_empty() || self.key.ends_with('/')
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}/{}", self.alias, self.bucket)
        } else {
            write!(f, "{}/{}/{}", self.alias, self.bucket, self.key)
        }
    }
}

/// Result of parsing a command-line path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    Local(PathBuf),
    Remote(RemotePath),
}

impl ParsedPath {
    pub fn is_remote(&self) -> bool {
        matches!(self, ParsedPath::Remote(_))
    }
}

/// Parse a command-line path
///
/// Absolute paths, paths starting with `.` or `~`, Windows drive paths and
/// single segments are local. Anything else must look like
/// `alias/bucket[/key]`.
pub fn parse_path(path: &str) -> Result<ParsedPath> {
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".to_string()));
    }

    if is_local_path(path) {
        return Ok(ParsedPath::Local(PathBuf::from(path)));
    }

    let mut parts = path.splitn(3, '/');
    let alias = parts.next().unwrap_or_default();
    let bucket = parts.next().unwrap_or_default();
    let key = parts.next().unwrap_or_default();

    if alias.is_empty() {
        return Err(Error::InvalidPath(format!("Missing alias in '{path}'")));
    }
    if bucket.is_empty() {
        return Err(Error::InvalidPath(format!("Missing bucket in '{path}'")));
    }

    Ok(ParsedPath::Remote(RemotePath::new(
        alias,
        bucket,
        key.trim_start_matches('/'),
    )))
}

fn is_local_path(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('.') || path.starts_with('~') {
        return true;
    }

    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }

    !path.contains('/')
}
