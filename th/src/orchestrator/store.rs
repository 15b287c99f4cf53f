//! Task table

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::debug;

use super::{StoreError, Task, TaskId};

/// Shared handle to one task; recording locks only this task
pub type TaskHandle = Arc<Mutex<Task>>;

/// Repository over the live task table
///
/// The table lock is held only to insert, look up or remove a handle.
pub trait TaskStore: Send + Sync {
    /// Add a new task; fails if the id is already present
    fn insert(&self, task: Task) -> Result<TaskHandle, StoreError>;

    fn get(&self, id: &TaskId) -> Result<Option<TaskHandle>, StoreError>;

    /// Remove the task only if `predicate` holds, atomically with the check
    fn remove_if(&self, id: &TaskId, predicate: &dyn Fn(&Task) -> bool) -> Result<Option<TaskHandle>, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// Lock a task, mapping poisoning to a store error
pub fn lock_task(handle: &TaskHandle) -> Result<MutexGuard<'_, Task>, StoreError> {
    handle.lock().map_err(|e| StoreError::Poisoned(e.to_string()))
}

/// Process-lifetime task table
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, TaskHandle>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn insert(&self, task: Task) -> Result<TaskHandle, StoreError> {
        debug!(id = %task.id, "InMemoryTaskStore::insert: called");
        let mut tasks = self.tasks.write().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateTask(task.id));
        }
        let id = task.id;
        let handle = Arc::new(Mutex::new(task));
        tasks.insert(id, handle.clone());
        Ok(handle)
    }

    fn get(&self, id: &TaskId) -> Result<Option<TaskHandle>, StoreError> {
        let tasks = self.tasks.read().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(tasks.get(id).cloned())
    }

    fn remove_if(&self, id: &TaskId, predicate: &dyn Fn(&Task) -> bool) -> Result<Option<TaskHandle>, StoreError> {
        debug!(%id, "InMemoryTaskStore::remove_if: called");
        let mut tasks = self.tasks.write().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let Some(handle) = tasks.get(id) else {
            return Ok(None);
        };
        if !predicate(&*lock_task(handle)?) {
            return Ok(None);
        }
        Ok(tasks.remove(id))
    }

    fn len(&self) -> Result<usize, StoreError> {
        let tasks = self.tasks.read().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(tasks.len())
    }
}
