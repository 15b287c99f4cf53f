//! Fixed-size FIFO worker pool
//!
//! Workers share one unbounded queue. Each worker takes the queue lock,
//! waits for the next job, releases the lock and runs the job to completion,
//! so jobs start in submission order and at most `size` run at once.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use eyre::{Result, eyre};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A unit of background work
pub type Job = BoxFuture<'static, ()>;

pub struct WorkerPool {
    size: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `size` workers (at least one) on the current tokio runtime
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        debug!(%size, "WorkerPool::new: called");
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(AsyncMutex::new(rx));

        let workers = (0..size)
            .map(|worker| tokio::spawn(Self::worker_loop(worker, rx.clone())))
            .collect();

        Self {
            size,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job; never waits for a free worker
    pub fn spawn(&self, job: Job) -> Result<()> {
        let sender = self.sender.lock().map_err(|_| eyre!("Worker pool lock poisoned"))?;
        match sender.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| eyre!("Worker pool has stopped")),
            None => Err(eyre!("Worker pool is shut down")),
        }
    }

    /// Stop accepting jobs, drain the queue and wait for every worker
    pub async fn shutdown(&self) {
        debug!("WorkerPool::shutdown: called");
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker exited abnormally");
            }
        }
        info!(size = self.size, "Worker pool stopped");
    }

    async fn worker_loop(worker: usize, rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Job>>>) {
        debug!(%worker, "worker_loop: started");
        loop {
            let job = rx.lock().await.recv().await;
            let Some(job) = job else {
                break;
            };
            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                warn!(%worker, "Job panicked, worker continues");
            }
        }
        debug!(%worker, "worker_loop: queue closed, exiting");
    }
}
