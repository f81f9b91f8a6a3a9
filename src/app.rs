//! The operation surface consumed by whatever front end drives the tracker.
//! Stateless orchestration: input validation happens here, everything else
//! is delegated, and component errors propagate to the caller unchanged.

use anyhow::{Context, Result, bail};

use crate::store::{NewTask, Store, Task, TaskPatch, TimeLog};
use crate::timer::{ActiveTimer, TimerController};

pub struct App {
    store: Store,
    timer: TimerController,
}

impl App {
    /// Open against the configured on-disk database.
    pub fn open() -> Result<Self> {
        Ok(Self::with_store(Store::open()?))
    }

    pub fn with_store(store: Store) -> Self {
        App {
            store,
            timer: TimerController::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// All tasks with their time logs, newest-created first.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.list_tasks()
    }

    /// Create a task (status starts at `TODO`). A supplied parent must
    /// exist; a fresh task has no children, so no cycle can form here.
    pub fn create_task(&self, new: &NewTask) -> Result<Task> {
        if let Some(ref parent_id) = new.parent_id {
            self.store
                .find_task(parent_id)?
                .with_context(|| format!("parent task {parent_id} not found"))?;
        }
        self.store.create_task(new)
    }

    /// Partial update. Re-parenting is validated so the forest stays a
    /// forest: the new parent must exist and must not be the task itself or
    /// one of its descendants.
    pub fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        if let Some(Some(ref new_parent)) = patch.parent_id {
            if new_parent.as_str() == id {
                bail!("task {id} cannot be its own parent");
            }
            if self.store.find_task(new_parent)?.is_none() {
                bail!("parent task {new_parent} not found");
            }
            if self.store.collect_descendant_ids(id)?.contains(new_parent) {
                bail!("cannot move task {id} under its own descendant {new_parent}");
            }
        }
        self.store.update_task(id, patch)
    }

    /// Delete the task and its whole subtree, logs included. An id that is
    /// already gone deletes nothing and does not error, so retrying a
    /// half-finished cascade is safe.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        self.store.delete_task_cascade(id)
    }

    /// Start a timer on the task, stopping any running timer first.
    pub fn start_timer(&self, task_id: &str) -> Result<TimeLog> {
        self.timer.start(&self.store, task_id)
    }

    /// Stop the identified log with the caller-computed elapsed seconds.
    pub fn stop_timer(&self, log_id: &str, duration: i64) -> Result<TimeLog> {
        self.timer.stop(&self.store, log_id, duration)
    }

    /// The in-memory view of the running timer, if this process started one.
    pub fn active_timer(&self) -> Option<ActiveTimer> {
        self.timer.active()
    }
}
