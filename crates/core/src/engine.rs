//! Sync engine
//!
//! Entry point tying scan, plan, scheduling and aggregation together for
//! one injected [`ObjectStore`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::exclude::ExcludeRules;
use crate::observer::{LogObserver, SyncEvent, SyncObserver};
use crate::options::SyncOptions;
use crate::outcome::OperationOutcome;
use crate::plan::{SyncPlan, UploadTask};
use crate::scan::{ScanResult, TransferCandidate, normalize_prefix, scan};
use crate::scheduler::Scheduler;
use crate::traits::ObjectStore;

/// Result of a single-object download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Download {
    pub key: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Uploads local files and directories to an object store
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    observer: Arc<dyn SyncObserver>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Upload a file or a directory tree
    ///
    /// For a directory `remote` is the key prefix. For a single file it is
    /// the target key; an empty key or one ending in `/` gets the file name
    /// appended.
    ///
    /// Returns `Err` only for fatal errors. Per-file failures are counted
    /// in the outcome; see [`OperationOutcome::aggregate_error`].
    pub async fn upload(
        &self,
        local: &Path,
        remote: &str,
        options: &SyncOptions,
    ) -> Result<OperationOutcome> {
        let metadata = tokio::fs::metadata(local).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(local.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

        if metadata.is_dir() {
            self.upload_directory(local, remote, options).await
        } else {
            let key = resolve_file_key(local, remote)?;
            self.upload_file(local, &key, metadata.len(), options).await
        }
    }

    /// Download the object at `key` to `local`
    ///
    /// When `local` is an existing directory the key's base name is
    /// appended to it. Missing parent directories are not created.
    pub async fn download(&self, key: &str, local: &Path) -> Result<Download> {
        let key = key.trim_start_matches('/');
        let path = resolve_download_path(key, local).await?;

        tracing::info!(key, path = %path.display(), "Starting download");
        let bytes = self.store.get_object(key, &path).await?;

        Ok(Download {
            key: key.to_string(),
            path,
            bytes,
        })
    }

    /// Upload every non-excluded file below `root` under `prefix`
    pub async fn upload_directory(
        &self,
        root: &Path,
        prefix: &str,
        options: &SyncOptions,
    ) -> Result<OperationOutcome> {
        tracing::info!(
            root = %root.display(),
            prefix = %normalize_prefix(prefix),
            rules = options.exclude.len(),
            incremental = options.incremental,
            concurrent = options.concurrent,
            "Starting directory upload"
        );

        let scanned = scan_blocking(root, prefix, ExcludeRules::new(&options.exclude)).await?;
        let mut plan = SyncPlan::new(scanned, options.incremental);

        self.observer.on_event(&SyncEvent::ScanComplete {
            tasks: plan.tasks.len(),
            excluded: plan.excluded,
        });

        if !plan.is_empty() {
            self.execute(&mut plan, options).await;
        }

        Ok(self.finish(&plan))
    }

    /// Upload a single file to `key`
    ///
    /// Exclusion rules do not apply to an explicitly named file.
    pub async fn upload_file(
        &self,
        local: &Path,
        key: &str,
        size: u64,
        options: &SyncOptions,
    ) -> Result<OperationOutcome> {
        let local_path = std::path::absolute(local)?;
        let task = UploadTask::new(
            TransferCandidate {
                local_path,
                remote_key: key.trim_start_matches('/').to_string(),
                size,
            },
            options.incremental,
        );
        let mut plan = SyncPlan {
            tasks: vec![task],
            excluded: 0,
        };

        self.scheduler(options).run_sequential(&mut plan).await;
        Ok(self.finish(&plan))
    }

    async fn execute(&self, plan: &mut SyncPlan, options: &SyncOptions) {
        let scheduler = self.scheduler(options);
        if options.concurrent {
            let workers = options.worker_count();
            tracing::info!(workers, "Using concurrent upload");
            scheduler.run_concurrent(plan, workers).await;
        } else {
            scheduler.run_sequential(plan).await;
        }
    }

    fn scheduler(&self, options: &SyncOptions) -> Scheduler {
        Scheduler::new(Arc::clone(&self.store), Arc::clone(&self.observer), options)
    }

    fn finish(&self, plan: &SyncPlan) -> OperationOutcome {
        let outcome = OperationOutcome::from_tasks(&plan.tasks, plan.excluded);
        self.observer
            .on_event(&SyncEvent::Finished { outcome: &outcome });
        outcome
    }
}

async fn scan_blocking(root: &Path, prefix: &str, rules: ExcludeRules) -> Result<ScanResult> {
    let root: PathBuf = root.to_path_buf();
    let prefix = prefix.to_string();
    tokio::task::spawn_blocking(move || scan(&root, &prefix, &rules))
        .await
        .map_err(|e| Error::Scan(format!("scan task failed: {e}")))?
}

/// Work out the local file a download is written to
pub async fn resolve_download_path(key: &str, local: &Path) -> Result<PathBuf> {
    let name = match key.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(Error::InvalidPath(format!("Not an object key: '{key}'"))),
    };

    match tokio::fs::metadata(local).await {
        Ok(metadata) if metadata.is_dir() => Ok(local.join(name)),
        _ => Ok(local.to_path_buf()),
    }
}

/// Work out the key for a single-file upload
pub fn resolve_file_key(local: &Path, remote: &str) -> Result<String> {
    let remote = remote.trim_start_matches('/');
    if !remote.is_empty() && !remote.ends_with('/') {
        return Ok(remote.to_string());
    }

    let name = local
        .file_name()
        .ok_or_else(|| Error::InvalidPath(format!("No file name in {}", local.display())))?;
    Ok(format!("{remote}{}", name.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeStore, RecordingObserver};
    use tempfile::TempDir;

    fn engine(store: &Arc<FakeStore>, observer: &Arc<RecordingObserver>) -> SyncEngine {
        SyncEngine::new(store.clone()).with_observer(observer.clone())
    }

    #[test]
    fn test_resolve_file_key() {
        let local = Path::new("/data/report.pdf");
        assert_eq!(resolve_file_key(local, "").unwrap(), "report.pdf");
        assert_eq!(resolve_file_key(local, "docs/").unwrap(), "docs/report.pdf");
        assert_eq!(resolve_file_key(local, "/docs/r.pdf").unwrap(), "docs/r.pdf");
        assert!(resolve_file_key(Path::new("/"), "").is_err());
    }

    #[tokio::test]
    async fn test_resolve_download_path() {
        let dir = TempDir::new().unwrap();
        let into_dir = resolve_download_path("site/index.html", dir.path()).await.unwrap();
        assert_eq!(into_dir, dir.path().join("index.html"));

        let named = dir.path().join("copy.html");
        let explicit = resolve_download_path("site/index.html", &named).await.unwrap();
        assert_eq!(explicit, named);

        assert!(resolve_download_path("site/", dir.path()).await.is_err());
        assert!(resolve_download_path("", dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_download_into_directory() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FakeStore::new());
        store.insert_with_content("docs/report.pdf", b"%PDF");
        let observer = Arc::new(RecordingObserver::default());

        let download = engine(&store, &observer)
            .download("/docs/report.pdf", dir.path())
            .await
            .unwrap();

        assert_eq!(download.key, "docs/report.pdf");
        assert_eq!(download.path, dir.path().join("report.pdf"));
        assert_eq!(download.bytes, 4);
        assert_eq!(std::fs::read(&download.path).unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FakeStore::new());
        let observer = Arc::new(RecordingObserver::default());

        let err = engine(&store, &observer)
            .download("nope.txt", dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert!(!dir.path().join("nope.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one.txt");
        std::fs::write(&path, b"1").unwrap();
        let store = Arc::new(FakeStore::new());
        let observer = Arc::new(RecordingObserver::default());

        let outcome = engine(&store, &observer)
            .upload(&path, "backup/", &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(store.uploaded_keys(), vec!["backup/one.txt"]);
        assert_eq!(observer.count("finished"), 1);
    }

    #[tokio::test]
    async fn test_upload_single_file_incremental_skip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one.txt");
        std::fs::write(&path, b"1").unwrap();
        let store = Arc::new(FakeStore::new());
        store.insert_with_content("one.txt", b"1");
        let observer = Arc::new(RecordingObserver::default());
        let options = SyncOptions {
            incremental: true,
            ..Default::default()
        };

        let outcome = engine(&store, &observer)
            .upload(&path, "", &options)
            .await
            .unwrap();

        assert_eq!(outcome.skipped, 1);
        assert!(store.uploaded_keys().is_empty());
    }

    #[tokio::test]
    async fn test_upload_missing_path() {
        let store = Arc::new(FakeStore::new());
        let observer = Arc::new(RecordingObserver::default());

        let err = engine(&store, &observer)
            .upload(Path::new("/no/such/dir"), "x/", &SyncOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FakeStore::new());
        let observer = Arc::new(RecordingObserver::default());

        let outcome = engine(&store, &observer)
            .upload(dir.path(), "p", &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome, OperationOutcome::default());
        assert_eq!(observer.count("scan_complete"), 1);
        assert_eq!(observer.count("finished"), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_reported_in_outcome() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.txt"), b"ok").unwrap();
        std::fs::write(dir.path().join("bad.txt"), b"bad").unwrap();
        let store = Arc::new(FakeStore::new().fail_put("p/bad.txt"));
        let observer = Arc::new(RecordingObserver::default());
        let options = SyncOptions {
            concurrent: true,
            workers: 2,
            ..Default::default()
        };

        let outcome = engine(&store, &observer)
            .upload(dir.path(), "p", &options)
            .await
            .unwrap();

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert!(matches!(
            outcome.aggregate_error(),
            Some(Error::PartialFailure {
                failed: 1,
                attempted: 2
            })
        ));
    }
}
