//! TaskOrchestrator - submit, poll and consume background theory tasks

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use eyre::Result;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::pool::{Job, WorkerPool};
use super::store::{InMemoryTaskStore, TaskStore, lock_task};
use super::{Task, TaskId, TaskStatus, TaskView, TheoryRunner};
use crate::config::OrchestratorConfig;

/// Runs N theories per task on a bounded worker pool
pub struct TaskOrchestrator {
    runner: Arc<dyn TheoryRunner>,
    store: Arc<dyn TaskStore>,
    pool: WorkerPool,
    max_theories: usize,
}

impl TaskOrchestrator {
    /// Create an orchestrator with a fresh in-memory task table
    ///
    /// Must be called inside a tokio runtime (the pool starts its workers).
    pub fn new(runner: Arc<dyn TheoryRunner>, config: &OrchestratorConfig) -> Self {
        Self::with_store(runner, Arc::new(InMemoryTaskStore::new()), config)
    }

    pub fn with_store(runner: Arc<dyn TheoryRunner>, store: Arc<dyn TaskStore>, config: &OrchestratorConfig) -> Self {
        debug!(
            runner = runner.name(),
            pool_size = config.pool_size,
            max_theories = config.max_theories,
            "TaskOrchestrator::new: called"
        );
        Self {
            runner,
            store,
            pool: WorkerPool::new(config.pool_size),
            max_theories: config.max_theories.max(1),
        }
    }

    /// Start `count` theories for `query` and return at once
    ///
    /// `count` is clamped into `1..=max_theories`.
    pub fn submit(&self, query: &str, count: usize) -> Result<TaskId> {
        let theories = count.clamp(1, self.max_theories);
        debug!(requested = count, %theories, "submit: called");
        if theories != count {
            info!(requested = count, %theories, "Clamped theory count");
        }

        let id = TaskId::new();
        let handle = self.store.insert(Task::new(id, theories))?;

        for index in 0..theories {
            let job = theory_job(self.runner.clone(), self.store.clone(), id, index, query.to_string());
            if let Err(e) = self.pool.spawn(job) {
                warn!(%id, error = %e, "Could not enqueue theory, dropping task");
                self.store.remove_if(&id, &|_| true)?;
                return Err(e);
            }
        }

        lock_task(&handle)?.mark_running();
        info!(%id, %theories, runner = self.runner.name(), "Task submitted");
        Ok(id)
    }

    /// Current state of a task; never changes it
    pub fn poll(&self, id: &TaskId) -> Option<TaskView> {
        debug!(%id, "poll: called");
        let view = self
            .store
            .get(id)
            .and_then(|handle| handle.map(|h| lock_task(&h).map(|task| task.view())).transpose());
        match view {
            Ok(view) => view,
            Err(e) => {
                error!(%id, error = %e, "poll: task table unavailable");
                None
            }
        }
    }

    /// Like poll, but a completed or failed task is removed and returned
    /// exactly once
    pub fn consume(&self, id: &TaskId) -> Option<TaskView> {
        debug!(%id, "consume: called");
        let removed = self
            .store
            .remove_if(id, &|task| task.status.is_terminal())
            .and_then(|handle| handle.map(|h| lock_task(&h).map(|task| task.view())).transpose());
        match removed {
            Ok(Some(view)) => {
                info!(%id, status = %view.status, "Task consumed");
                Some(view)
            }
            Ok(None) => self.poll(id),
            Err(e) => {
                error!(%id, error = %e, "consume: task table unavailable");
                None
            }
        }
    }

    /// Number of tasks currently tracked
    pub fn len(&self) -> usize {
        self.store.len().unwrap_or_else(|e| {
            error!(error = %e, "len: task table unavailable");
            0
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting work and wait for queued and running theories
    pub async fn shutdown(&self) {
        debug!("shutdown: called");
        self.pool.shutdown().await;
        info!(tracked = self.len(), "Orchestrator stopped");
    }
}

fn theory_job(runner: Arc<dyn TheoryRunner>, store: Arc<dyn TaskStore>, id: TaskId, index: usize, query: String) -> Job {
    async move {
        debug!(%id, %index, "theory_job: started");
        let outcome = match AssertUnwindSafe(runner.run(&query)).catch_unwind().await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(payload) => Err(panic_message(payload)),
        };
        record_outcome(store.as_ref(), id, index, outcome);
    }
    .boxed()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("panicked: {}", detail)
}

fn record_outcome(store: &dyn TaskStore, id: TaskId, index: usize, outcome: std::result::Result<String, String>) {
    let handle = match store.get(&id) {
        Ok(Some(handle)) => handle,
        Ok(None) => {
            debug!(%id, %index, "record_outcome: task no longer tracked, dropping result");
            return;
        }
        Err(e) => {
            error!(%id, %index, error = %e, "record_outcome: task table unavailable");
            return;
        }
    };

    let mut task = match lock_task(&handle) {
        Ok(task) => task,
        Err(e) => {
            error!(%id, %index, error = %e, "record_outcome: task lock unavailable");
            return;
        }
    };

    let recorded = match outcome {
        Ok(text) => task.record_success(index, text),
        Err(reason) => {
            warn!(%id, %index, %reason, "Theory failed");
            task.record_failure(index, &reason)
        }
    };

    match recorded {
        Ok(TaskStatus::Completed) => info!(%id, theories = task.theory_count, "All theories completed"),
        Ok(TaskStatus::Failed) => debug!(%id, %index, done = task.theories_done(), "record_outcome: task failed"),
        Ok(status) => debug!(%id, %index, %status, done = task.theories_done(), "record_outcome: theory recorded"),
        Err(e) => error!(%id, %index, error = %e, "record_outcome: rejected result"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::runner::mock::{ScriptedRunner, Step};
    use std::time::Duration;

    fn config(pool_size: usize, max_theories: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            pool_size,
            max_theories,
            ..Default::default()
        }
    }

    async fn wait_terminal(orch: &TaskOrchestrator, id: &TaskId) -> TaskView {
        for _ in 0..500 {
            match orch.poll(id) {
                Some(view) if view.status.is_terminal() => return view,
                _ => {}
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {} never finished", id);
    }

    #[tokio::test]
    async fn test_submit_returns_before_theories_finish() {
        let runner = Arc::new(ScriptedRunner::replying("slow", Duration::from_millis(200)));
        let orch = TaskOrchestrator::new(runner, &config(2, 3));

        let id = orch.submit("q", 2).unwrap();
        let view = orch.poll(&id).unwrap();

        assert_eq!(view.status, TaskStatus::Running);
        assert_eq!(view.theory_count, 2);
        assert_eq!(view.theories_done, 0);
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_theory_count_is_clamped() {
        let runner = Arc::new(ScriptedRunner::replying("t", Duration::ZERO));
        let orch = TaskOrchestrator::new(runner.clone(), &config(2, 3));

        let zero = orch.submit("q", 0).unwrap();
        let many = orch.submit("q", 10).unwrap();
        orch.shutdown().await;

        assert_eq!(orch.poll(&zero).unwrap().theory_count, 1);
        assert_eq!(orch.poll(&many).unwrap().theory_count, 3);
        assert_eq!(runner.call_count(), 4);
    }

    #[tokio::test]
    async fn test_all_theories_combined_in_index_order() {
        // earlier theories take longer, so they finish last
        let runner = Arc::new(ScriptedRunner::new(vec![
            Step::Reply("first".to_string(), Duration::from_millis(60)),
            Step::Reply("second".to_string(), Duration::from_millis(30)),
            Step::Reply("third".to_string(), Duration::ZERO),
        ]));
        let orch = TaskOrchestrator::new(runner, &config(3, 3));

        let id = orch.submit("q", 3).unwrap();
        let view = wait_terminal(&orch, &id).await;

        assert_eq!(view.status, TaskStatus::Completed);
        assert_eq!(
            view.result.as_deref(),
            Some("Theory 1:\nfirst\n\n---\n\nTheory 2:\nsecond\n\n---\n\nTheory 3:\nthird")
        );
        assert_eq!(view.theories_done, 3);
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_dominates() {
        // one worker, so call order is index order
        let runner = Arc::new(ScriptedRunner::new(vec![
            Step::Reply("ok".to_string(), Duration::ZERO),
            Step::Fail("model unreachable".to_string()),
        ]));
        let orch = TaskOrchestrator::new(runner, &config(1, 3));

        let id = orch.submit("q", 2).unwrap();
        let view = wait_terminal(&orch, &id).await;

        assert_eq!(view.status, TaskStatus::Failed);
        assert_eq!(view.error.as_deref(), Some("Theory 1 failed: model unreachable"));
        assert!(view.result.is_none());
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_runner_fails_task() {
        let runner = Arc::new(ScriptedRunner::new(vec![Step::Panic]));
        let orch = TaskOrchestrator::new(runner, &config(1, 3));

        let id = orch.submit("q", 1).unwrap();
        let view = wait_terminal(&orch, &id).await;

        assert_eq!(view.status, TaskStatus::Failed);
        assert_eq!(
            view.error.as_deref(),
            Some("Theory 0 failed: panicked: runner exploded on call 0")
        );

        // the worker survived and still serves new tasks
        let next = orch.submit("q", 1).unwrap();
        assert_eq!(wait_terminal(&orch, &next).await.status, TaskStatus::Failed);
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_poll_is_idempotent() {
        let runner = Arc::new(ScriptedRunner::replying("done", Duration::ZERO));
        let orch = TaskOrchestrator::new(runner, &config(2, 3));

        let id = orch.submit("q", 2).unwrap();
        let first = wait_terminal(&orch, &id).await;

        for _ in 0..3 {
            assert_eq!(orch.poll(&id).as_ref(), Some(&first));
        }
        assert_eq!(orch.len(), 1);
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_consume_removes_terminal_task_once() {
        let runner = Arc::new(ScriptedRunner::replying("done", Duration::ZERO));
        let orch = TaskOrchestrator::new(runner, &config(2, 3));

        let id = orch.submit("q", 1).unwrap();
        let polled = wait_terminal(&orch, &id).await;

        assert_eq!(orch.consume(&id), Some(polled));
        assert_eq!(orch.consume(&id), None);
        assert_eq!(orch.poll(&id), None);
        assert!(orch.is_empty());
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_consume_keeps_running_task() {
        let runner = Arc::new(ScriptedRunner::replying("slow", Duration::from_millis(100)));
        let orch = TaskOrchestrator::new(runner, &config(1, 3));

        let id = orch.submit("q", 1).unwrap();
        assert_eq!(orch.consume(&id).unwrap().status, TaskStatus::Running);
        assert_eq!(orch.len(), 1);

        wait_terminal(&orch, &id).await;
        assert_eq!(orch.consume(&id).unwrap().status, TaskStatus::Completed);
        assert!(orch.is_empty());
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let runner = Arc::new(ScriptedRunner::replying("x", Duration::ZERO));
        let orch = TaskOrchestrator::new(runner, &config(1, 1));
        let id = TaskId::new();

        assert!(orch.poll(&id).is_none());
        assert!(orch.consume(&id).is_none());
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_results_for_removed_task_are_dropped() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let runner = Arc::new(ScriptedRunner::replying("late", Duration::from_millis(30)));
        let orch = TaskOrchestrator::with_store(runner.clone(), store.clone(), &config(1, 3));

        let id = orch.submit("q", 1).unwrap();
        store.remove_if(&id, &|_| true).unwrap();
        orch.shutdown().await;

        assert_eq!(runner.call_count(), 1);
        assert!(orch.poll(&id).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_bounded_by_pool_size() {
        let runner = Arc::new(ScriptedRunner::replying("t", Duration::from_millis(40)));
        let orch = TaskOrchestrator::new(runner.clone(), &config(2, 3));

        let id = orch.submit("q", 3).unwrap();
        let view = wait_terminal(&orch, &id).await;

        assert_eq!(view.status, TaskStatus::Completed);
        assert!(runner.peak_concurrency() <= 2);
        assert_eq!(runner.call_count(), 3);
        orch.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails_cleanly() {
        let runner = Arc::new(ScriptedRunner::replying("x", Duration::ZERO));
        let orch = TaskOrchestrator::new(runner, &config(1, 3));
        orch.shutdown().await;

        assert!(orch.submit("q", 2).is_err());
        assert!(orch.is_empty());
    }
}
