//! Task registry
//!
//! Every running invocation is registered under a monotonically increasing
//! index so a separate command can list and cancel it. Cancelling only fires
//! the task's token; the entry disappears when the invocation's
//! [`TaskGuard`] is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A registered, possibly still running invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunningTask {
    pub index: u64,
    #[serde(skip)]
    pub token: CancellationToken,
    /// Human readable origin, e.g. "ana in #general"
    pub context: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    next_index: u64,
    tasks: BTreeMap<u64, RunningTask>,
}

/// Shared, cloneable registry of running invocations
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The map stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new invocation; it is removed again when the guard drops
    pub fn submit(&self, context: impl Into<String>) -> TaskGuard {
        let mut inner = self.lock();
        inner.next_index += 1;
        let task = RunningTask {
            index: inner.next_index,
            token: CancellationToken::new(),
            context: context.into(),
            started_at: Utc::now(),
        };
        debug!(index = task.index, context = %task.context, "task submitted");
        inner.tasks.insert(task.index, task.clone());

        TaskGuard {
            registry: self.clone(),
            task,
        }
    }

    /// Snapshot of the registered tasks, oldest first
    pub fn tasks(&self) -> Vec<RunningTask> {
        self.lock().tasks.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// Fire the token of task `index`; false if there is no such task
    pub fn cancel(&self, index: u64) -> bool {
        match self.lock().tasks.get(&index) {
            Some(task) => {
                info!(index, context = %task.context, "cancelling task");
                task.token.cancel();
                true
            }
            None => false,
        }
    }

    /// The most recently submitted task still registered
    pub fn latest(&self) -> Option<RunningTask> {
        self.lock().tasks.values().next_back().cloned()
    }

    /// Fire the token of the most recent task, returning its index
    pub fn cancel_last(&self) -> Option<u64> {
        let index = self.latest()?.index;
        self.cancel(index).then_some(index)
    }

    /// Fire every registered token, returning how many there were
    pub fn cancel_all(&self) -> usize {
        let inner = self.lock();
        for task in inner.tasks.values() {
            task.token.cancel();
        }
        if !inner.tasks.is_empty() {
            info!(count = inner.tasks.len(), "cancelling all tasks");
        }
        inner.tasks.len()
    }

    /// Forget task `index`; removing an absent task is a no-op
    pub fn remove(&self, index: u64) -> Option<RunningTask> {
        self.lock().tasks.remove(&index)
    }

    /// Forget every task without cancelling it
    pub fn clear(&self) {
        self.lock().tasks.clear();
    }
}

/// Keeps a task registered for as long as it lives
#[derive(Debug)]
pub struct TaskGuard {
    registry: TaskRegistry,
    task: RunningTask,
}

impl TaskGuard {
    pub fn index(&self) -> u64 {
        self.task.index
    }

    /// The token the invocation should run under
    pub fn token(&self) -> CancellationToken {
        self.task.token.clone()
    }

    pub fn task(&self) -> &RunningTask {
        &self.task
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.registry.remove(self.task.index).is_some() {
            debug!(index = self.task.index, "task finished");
        }
    }
}
