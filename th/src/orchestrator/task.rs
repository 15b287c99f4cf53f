//! Task state and result aggregation

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::TaskId;

/// Separator placed between combined theory results
pub const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// Errors from recording into or storing tasks
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task already exists: {0}")]
    DuplicateTask(TaskId),

    #[error("Theory index {index} out of range for a task with {count} theories")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Theory {0} already recorded")]
    DuplicateIndex(usize),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, jobs not yet all enqueued
    Pending,
    /// Jobs enqueued, results outstanding
    Running,
    /// Every theory succeeded
    Completed,
    /// At least one theory failed
    Failed,
}

impl TaskStatus {
    /// Completed and Failed never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one theory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

/// One theory's outcome tagged with its origin index
#[derive(Debug, Clone)]
pub struct SubResult {
    pub index: usize,
    pub outcome: Outcome,
}

/// A background job made of one or more theories
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub theory_count: usize,
    pub results: Vec<SubResult>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, theory_count: usize) -> Self {
        debug!(%id, %theory_count, "Task::new: called");
        Self {
            id,
            status: TaskStatus::Pending,
            theory_count,
            results: Vec::with_capacity(theory_count),
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Pending -> Running; any other status is left alone
    ///
    /// Fast theories may finish before this is called, so it must never
    /// overwrite a terminal status.
    pub fn mark_running(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Running;
        }
    }

    /// Record a successful theory and complete the task once all are in
    pub fn record_success(&mut self, index: usize, text: String) -> Result<TaskStatus, StoreError> {
        debug!(id = %self.id, %index, "Task::record_success: called");
        self.push(index, Outcome::Success(text))?;

        if !self.status.is_terminal() && self.results.len() == self.theory_count {
            self.result = Some(self.combine());
            self.finish(TaskStatus::Completed);
        }
        Ok(self.status)
    }

    /// Record a failed theory; the first failure sets the task error
    pub fn record_failure(&mut self, index: usize, reason: &str) -> Result<TaskStatus, StoreError> {
        debug!(id = %self.id, %index, "Task::record_failure: called");
        self.push(index, Outcome::Failure(reason.to_string()))?;

        if !self.status.is_terminal() {
            self.error = Some(format!("Theory {} failed: {}", index, reason));
            self.finish(TaskStatus::Failed);
        }
        Ok(self.status)
    }

    /// Number of theories that have reported, successfully or not
    pub fn theories_done(&self) -> usize {
        self.results.len()
    }

    /// Snapshot for callers outside the lock
    pub fn view(&self) -> TaskView {
        TaskView {
            task_id: self.id,
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            theories_done: self.theories_done(),
            theory_count: self.theory_count,
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }

    fn push(&mut self, index: usize, outcome: Outcome) -> Result<(), StoreError> {
        if index >= self.theory_count {
            return Err(StoreError::IndexOutOfRange {
                index,
                count: self.theory_count,
            });
        }
        if self.results.iter().any(|r| r.index == index) {
            return Err(StoreError::DuplicateIndex(index));
        }
        self.results.push(SubResult { index, outcome });
        Ok(())
    }

    fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Successful results in origin order, numbered from 1
    fn combine(&self) -> String {
        let mut sorted: Vec<&SubResult> = self.results.iter().collect();
        sorted.sort_by_key(|r| r.index);
        sorted
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::Success(text) => Some(text.as_str()),
                Outcome::Failure(_) => None,
            })
            .enumerate()
            .map(|(i, text)| format!("Theory {}:\n{}", i + 1, text))
            .collect::<Vec<_>>()
            .join(RESULT_SEPARATOR)
    }
}

/// What poll and consume hand back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub theories_done: usize,
    pub theory_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
