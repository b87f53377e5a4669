use std::sync::Mutex;

use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Where fire-and-forget work runs.
///
/// Production code hands tasks to tokio; tests queue them on a
/// [`ManualScheduler`] and drive them to completion explicitly.
pub trait BackgroundScheduler: Send + Sync {
    fn spawn(&self, label: String, task: BoxFuture<'static, ()>);
}

/// Runs each task on the ambient tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl BackgroundScheduler for TokioScheduler {
    fn spawn(&self, label: String, task: BoxFuture<'static, ()>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(task = %label, "background task spawned");
                handle.spawn(task);
            }
            Err(err) => warn!(task = %label, error = %err, "no runtime; background task dropped"),
        }
    }
}

/// Queues tasks until [`run_all`](Self::run_all) is awaited.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<(String, BoxFuture<'static, ()>)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Run queued tasks in submission order, including any they enqueue.
    /// Returns how many ran.
    pub async fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = match self.queue.lock() {
                Ok(mut queue) => std::mem::take(&mut *queue),
                Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
            };
            if batch.is_empty() {
                return ran;
            }
            for (label, task) in batch {
                debug!(task = %label, "running queued task");
                task.await;
                ran += 1;
            }
        }
    }
}

impl BackgroundScheduler for ManualScheduler {
    fn spawn(&self, label: String, task: BoxFuture<'static, ()>) {
        match self.queue.lock() {
            Ok(mut queue) => queue.push((label, task)),
            Err(poisoned) => poisoned.into_inner().push((label, task)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    #[tokio::test]
    async fn manual_scheduler_defers_until_run() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            scheduler.spawn(
                "count".into(),
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
                .boxed(),
            );
        }
        assert_eq!(scheduler.pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.run_all().await, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn tokio_scheduler_runs_task() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        TokioScheduler.spawn(
            "ping".into(),
            async move {
                let _ = tx.send(42);
            }
            .boxed(),
        );
        assert_eq!(rx.await.unwrap(), 42);
    }
}
