//! Bounded worker pool
//!
//! All work items are queued before any worker starts and the queue is
//! closed immediately, so workers exit as soon as it drains. Awaiting
//! [`run_pool`] is the barrier: it returns only after every worker has
//! finished.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};

use crate::config::DEFAULT_WORKERS;
use crate::error::{Error, Result};

/// Replace a zero worker count with the default
pub fn effective_workers(workers: usize) -> usize {
    if workers == 0 {
        DEFAULT_WORKERS
    } else {
        workers
    }
}

/// Process `items` with at most `workers` concurrent workers
///
/// `handler` receives the worker id and one item. Each item is handled by
/// exactly one worker. Results come back in the order of `items`, one per
/// item. An item whose handler panicked yields `Err` and the worker moves
/// on to the next item.
pub async fn run_pool<T, R, F, Fut>(workers: usize, items: Vec<T>, handler: F) -> Vec<Result<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let mut slots: Vec<Option<Result<R>>> = (0..total).map(|_| None).collect();

    let (tx, rx) = mpsc::channel(total);
    for (index, item) in items.into_iter().enumerate() {
        if let Err(e) = tx.try_send((index, item)) {
            slots[index] = Some(Err(Error::General(format!("work queue rejected item: {e}"))));
        }
    }
    drop(tx);

    let queue = Arc::new(Mutex::new(rx));
    let handler = Arc::new(handler);
    let worker_count = effective_workers(workers).min(total);

    let handles: Vec<_> = (0..worker_count)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let mut done = Vec::new();
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some((index, item)) = next else {
                        break;
                    };
                    let result = AssertUnwindSafe(async { handler(id, item).await })
                        .catch_unwind()
                        .await
                        .map_err(|panic| {
                            let message = panic_message(panic.as_ref());
                            tracing::error!(worker = id, index, %message, "Worker panicked");
                            Error::General(format!("worker {id} panicked: {message}"))
                        });
                    done.push((index, result));
                }
                tracing::trace!(worker = id, handled = done.len(), "Worker drained queue");
                done
            })
        })
        .collect();

    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok(done) => {
                for (index, result) in done {
                    slots[index] = Some(result);
                }
            }
            Err(e) => tracing::error!(error = %e, "Worker task failed"),
        }
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Err(Error::General("worker stopped before item".to_string())))
        })
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
