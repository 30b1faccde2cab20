//! Ordered task registry.
//!
//! Lock order is registry first, then task. Workers update progress under the
//! task lock alone; insert, rename and remove take the registry lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::task::{lock, SharedTask, Task, TaskRenamer};

#[derive(Default)]
pub struct Registry {
    tasks: Mutex<Vec<SharedTask>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<SharedTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a task; fails if its name is already registered.
    pub fn insert(&self, task: SharedTask) -> Result<()> {
        let mut tasks = self.tasks();
        let name = lock(&task).info.name.clone();
        if find(&tasks, &name).is_some() {
            return Err(Error::NameCollision(name));
        }
        tasks.push(task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedTask> {
        let tasks = self.tasks();
        find(&tasks, name).map(|i| Arc::clone(&tasks[i]))
    }

    /// Removes a task, but only once it is terminal.
    pub fn remove_completed(&self, name: &str) -> Result<SharedTask> {
        let mut tasks = self.tasks();
        let idx = find(&tasks, name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        if !lock(&tasks[idx]).is_completed() {
            return Err(Error::StillDownloading(name.to_string()));
        }
        Ok(tasks.remove(idx))
    }

    /// Copies of every task, in insertion order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks().iter().map(|t| lock(t).clone()).collect()
    }

    /// Handles to every task, in insertion order.
    pub fn handles(&self) -> Vec<SharedTask> {
        self.tasks().clone()
    }

    pub fn has_in_progress(&self) -> bool {
        self.tasks().iter().any(|t| !lock(t).is_completed())
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn find(tasks: &[SharedTask], name: &str) -> Option<usize> {
    tasks.iter().position(|t| lock(t).info.name == name)
}

impl TaskRenamer for Registry {
    fn rename(&self, task: &SharedTask, new_name: &str) -> Result<()> {
        let tasks = self.tasks();
        let taken = tasks
            .iter()
            .any(|t| !Arc::ptr_eq(t, task) && lock(t).info.name == new_name);
        if taken {
            return Err(Error::NameCollision(new_name.to_string()));
        }
        let mut t = lock(task);
        if t.info.name != new_name {
            tracing::debug!(from = %t.info.name, to = %new_name, "task re-keyed");
            t.info.name = new_name.to_string();
        }
        Ok(())
    }
}
