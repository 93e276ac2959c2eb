//! Local directory scanning
//!
//! Walks a directory tree in lexical depth-first order and turns every
//! non-excluded file into a [`TransferCandidate`].

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::exclude::ExcludeRules;

/// A local file and the key it will be stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCandidate {
    /// Absolute path of the local file
    pub local_path: PathBuf,
    /// Bucket-relative key, `/`-separated, no leading slash
    pub remote_key: String,
    /// File size in bytes at scan time
    pub size: u64,
}

/// Output of a directory scan
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub candidates: Vec<TransferCandidate>,
    /// Files skipped by exclusion rules
    pub excluded: usize,
}

impl ScanResult {
    /// Number of files visited, excluded or not
    pub fn visited(&self) -> usize {
        self.candidates.len() + self.excluded
    }
}

/// Normalize a remote prefix: no leading `/`, trailing `/` when non-empty
pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_start_matches('/');
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

/// Scan `root` and build candidates under `remote_prefix`
///
/// Directories are never candidates. Symlinked directories are not
/// descended into; symlinks to files are uploaded as the file they point
/// to. Any traversal error aborts the scan.
pub fn scan(root: &Path, remote_prefix: &str, rules: &ExcludeRules) -> Result<ScanResult> {
    let root = std::path::absolute(root)
        .map(|abs| clean_path(&abs))
        .map_err(|e| Error::Scan(format!("{}: {e}", root.display())))?;
    let prefix = normalize_prefix(remote_prefix);

    let mut result = ScanResult::default();

    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !is_file_entry(&entry) {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(&root)
            .map_err(|e| Error::Scan(format!("{}: {e}", path.display())))?;
        let relative = to_slash(relative);
        let absolute = to_slash(path);

        if rules.is_excluded(&relative, &absolute) {
            tracing::debug!(path = %relative, "Excluded");
            result.excluded += 1;
            continue;
        }

        let size = std::fs::metadata(path)
            .map_err(|e| Error::Scan(format!("{}: {e}", path.display())))?
            .len();

        result.candidates.push(TransferCandidate {
            local_path: path.to_path_buf(),
            remote_key: format!("{prefix}{relative}"),
            size,
        });
    }

    tracing::info!(
        root = %root.display(),
        candidates = result.candidates.len(),
        excluded = result.excluded,
        "Scan complete"
    );

    Ok(result)
}

/// Fold `.` and `..` components without touching the filesystem
///
/// `..` at the root stays at the root. Symlinks are not resolved, so
/// `a/link/..` becomes `a` even when `link` points elsewhere.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

fn is_file_entry(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
