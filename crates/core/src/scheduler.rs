//! Upload scheduling
//!
//! Executes a [`SyncPlan`] either one file at a time or through two worker
//! pools: a hash-check pool and, once every check has finished, an upload
//! pool. A task is owned by exactly one worker while it is processed, so
//! only the completion counter and event output are shared.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::detect::ChangeDetector;
use crate::error::Error;
use crate::observer::{SyncEvent, SyncObserver};
use crate::options::{CheckFailurePolicy, SyncOptions};
use crate::plan::{SyncPlan, UploadTask};
use crate::pool::run_pool;
use crate::scan::TransferCandidate;
use crate::traits::ObjectStore;

/// Interval between progress events during the upload phase
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Serializes observer calls coming from concurrent workers
struct Reporter {
    observer: Arc<dyn SyncObserver>,
    lock: Mutex<()>,
}

impl Reporter {
    fn emit(&self, event: SyncEvent<'_>) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.observer.on_event(&event);
    }
}

/// Runs the check and upload phases of a plan
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn ObjectStore>,
    detector: ChangeDetector,
    reporter: Arc<Reporter>,
    policy: CheckFailurePolicy,
    dry_run: bool,
    progress_interval: Duration,
    completed: Arc<AtomicUsize>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        observer: Arc<dyn SyncObserver>,
        options: &SyncOptions,
    ) -> Self {
        Self {
            detector: ChangeDetector::new(Arc::clone(&store)),
            store,
            reporter: Arc::new(Reporter {
                observer,
                lock: Mutex::new(()),
            }),
            policy: options.on_check_error,
            dry_run: options.dry_run,
            progress_interval: PROGRESS_INTERVAL,
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Override the progress interval (tests use short intervals)
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Process tasks in scan order
    ///
    /// A failing task is recorded and iteration continues.
    pub async fn run_sequential(&self, plan: &mut SyncPlan) {
        for task in plan.tasks.iter_mut() {
            self.check(task, None).await;
            if task.ready_for_upload() {
                self.upload(task, None).await;
            }
        }
    }

    /// Process tasks with two pools of `workers` workers
    ///
    /// All hash checks finish before the first upload starts.
    pub async fn run_concurrent(&self, plan: &mut SyncPlan, workers: usize) {
        let mut tasks = std::mem::take(&mut plan.tasks);

        if tasks.iter().any(|t| t.needs_hash_check) {
            tasks = self.check_phase(tasks, workers).await;
            self.reporter.emit(SyncEvent::CheckComplete {
                to_upload: tasks.iter().filter(|t| t.ready_for_upload()).count(),
                unchanged: tasks.iter().filter(|t| t.is_skipped()).count(),
                failed: tasks.iter().filter(|t| t.is_failed()).count(),
            });
        }

        plan.tasks = self.upload_phase(tasks, workers).await;
    }

    async fn check_phase(&self, tasks: Vec<UploadTask>, workers: usize) -> Vec<UploadTask> {
        let (selected, rest) = split_tasks(tasks, |t| t.needs_hash_check);
        self.reporter.emit(SyncEvent::CheckStarted {
            tasks: selected.len(),
        });

        let checked = self.pooled(Phase::Check, selected, workers).await;
        merge_tasks(checked, rest)
    }

    async fn upload_phase(&self, tasks: Vec<UploadTask>, workers: usize) -> Vec<UploadTask> {
        let (selected, rest) = split_tasks(tasks, UploadTask::ready_for_upload);
        if selected.is_empty() {
            return merge_tasks(selected, rest);
        }

        self.reporter.emit(SyncEvent::UploadStarted {
            tasks: selected.len(),
            bytes: selected.iter().map(|(_, t)| t.size).sum(),
        });

        self.completed.store(0, Ordering::SeqCst);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let ticker = tokio::spawn(self.clone().progress_ticker(selected.len(), stop_rx));

        let uploaded = self.pooled(Phase::Upload, selected, workers).await;

        drop(stop_tx);
        if let Err(e) = ticker.await {
            tracing::debug!(error = %e, "Progress ticker ended abnormally");
        }

        merge_tasks(uploaded, rest)
    }

    /// Run one phase over `selected` on a worker pool
    ///
    /// A task whose worker panicked is rebuilt from its candidate and comes
    /// back failed, so every task is still accounted for.
    async fn pooled(
        &self,
        phase: Phase,
        selected: Vec<IndexedTask>,
        workers: usize,
    ) -> Vec<IndexedTask> {
        let candidates: Vec<(usize, TransferCandidate)> = selected
            .iter()
            .map(|(index, task)| (*index, task.candidate()))
            .collect();

        let this = self.clone();
        let results = run_pool(workers, selected, move |worker, (index, mut task)| {
            let this = this.clone();
            async move {
                match phase {
                    Phase::Check => this.check(&mut task, Some(worker)).await,
                    Phase::Upload => this.upload(&mut task, Some(worker)).await,
                }
                (index, task)
            }
        })
        .await;

        results
            .into_iter()
            .zip(candidates)
            .map(|(result, (index, candidate))| match result {
                Ok(done) => done,
                Err(error) => (index, self.lost_task(phase, candidate, error)),
            })
            .collect()
    }

    fn lost_task(&self, phase: Phase, candidate: TransferCandidate, error: Error) -> UploadTask {
        let mut task = UploadTask::new(candidate, false);
        match phase {
            Phase::Check => self.reporter.emit(SyncEvent::CheckFailed {
                key: &task.remote_key,
                error: &error,
                worker: None,
            }),
            Phase::Upload => {
                self.reporter.emit(SyncEvent::UploadFailed {
                    key: &task.remote_key,
                    error: &error,
                    worker: None,
                });
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
        }
        task.error = Some(error);
        task
    }

    async fn progress_ticker(self, total: usize, mut stop: oneshot::Receiver<()>) {
        let mut interval = tokio::time::interval(self.progress_interval);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = interval.tick() => {
                    self.reporter.emit(SyncEvent::Progress {
                        completed: self.completed.load(Ordering::SeqCst),
                        total,
                    });
                }
            }
        }
    }

    /// Run the change detector for a task flagged for checking
    async fn check(&self, task: &mut UploadTask, worker: Option<usize>) {
        if !task.needs_hash_check {
            return;
        }

        match self
            .detector
            .needs_transfer(&task.local_path, &task.remote_key)
            .await
        {
            Ok(needs_transfer) => {
                task.needs_transfer = needs_transfer;
                if !needs_transfer {
                    self.reporter.emit(SyncEvent::Unchanged {
                        key: &task.remote_key,
                        worker,
                    });
                }
            }
            Err(error) => {
                self.reporter.emit(SyncEvent::CheckFailed {
                    key: &task.remote_key,
                    error: &error,
                    worker,
                });
                task.needs_transfer = true;
                match self.policy {
                    CheckFailurePolicy::Fail => task.error = Some(error),
                    CheckFailurePolicy::Upload => {
                        tracing::warn!(key = %task.remote_key, "Uploading despite failed check");
                    }
                }
            }
        }
    }

    async fn upload(&self, task: &mut UploadTask, worker: Option<usize>) {
        if self.dry_run {
            self.reporter.emit(SyncEvent::WouldUpload {
                key: &task.remote_key,
                size: task.size,
            });
        } else {
            match self.store.put_object(&task.remote_key, &task.local_path).await {
                Ok(()) => {
                    self.reporter.emit(SyncEvent::Uploaded {
                        key: &task.remote_key,
                        size: task.size,
                        worker,
                    });
                }
                Err(e) => {
                    let error = Error::Transfer {
                        key: task.remote_key.clone(),
                        message: e.to_string(),
                    };
                    self.reporter.emit(SyncEvent::UploadFailed {
                        key: &task.remote_key,
                        error: &error,
                        worker,
                    });
                    task.error = Some(error);
                }
            }
        }

        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

type IndexedTask = (usize, UploadTask);

#[derive(Debug, Clone, Copy)]
enum Phase {
    Check,
    Upload,
}

/// Split tasks into those matching `select` and the rest, keeping indices
fn split_tasks(
    tasks: Vec<UploadTask>,
    select: impl Fn(&UploadTask) -> bool,
) -> (Vec<IndexedTask>, Vec<IndexedTask>) {
    tasks.into_iter().enumerate().partition(|(_, t)| select(t))
}

/// Reassemble a split task list in its original order
fn merge_tasks(a: Vec<IndexedTask>, b: Vec<IndexedTask>) -> Vec<UploadTask> {
    let mut all: Vec<IndexedTask> = a.into_iter().chain(b).collect();
    all.sort_by_key(|(index, _)| *index);
    all.into_iter().map(|(_, task)| task).collect()
}
