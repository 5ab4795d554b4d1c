//! The task store: a monotonic index generator plus two lookup maps,
//! owned exclusively by the dispatcher. This needs no internal locking --
//! the dispatcher's single-writer command loop is the only caller, so
//! every method here takes `&mut self`.

use std::collections::HashMap;

use avs_types::{FinishedTask, Task, TaskDigest, TaskIndex, TaskState};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("a task with digest {0:?} is already open")]
    DuplicateDigest(TaskDigest),
    #[error("digest {0:?} is already finished")]
    AlreadyFinished(TaskDigest),
    #[error("no open task with digest {0:?}")]
    NoSuchOpenTask(TaskDigest),
}

/// Owns every [`Task`] and [`FinishedTask`] record for one AVS instance.
#[derive(Default)]
pub struct TaskStore {
    next_index: TaskIndex,
    open_by_index: HashMap<TaskIndex, Task>,
    open_by_digest: HashMap<TaskDigest, TaskIndex>,
    finished: HashMap<TaskDigest, FinishedTask>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates and returns the next task index: strictly increasing,
    /// never reused.
    pub fn new_index(&mut self) -> TaskIndex {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Returns the receipt of a digest that has already finished, if any --
    /// used by `CreateTask` to implement the `AlreadyFinished` error.
    pub fn finished_by_digest(&self, digest: &TaskDigest) -> Option<&FinishedTask> {
        self.finished.get(digest)
    }

    /// Returns the currently open task for a digest, if one exists --
    /// used to dedup `CreateTask`.
    pub fn open_by_digest(&self, digest: &TaskDigest) -> Option<&Task> {
        self.open_by_digest
            .get(digest)
            .and_then(|index| self.open_by_index.get(index))
    }

    pub fn by_index(&self, index: TaskIndex) -> Option<&Task> {
        self.open_by_index.get(&index)
    }

    pub fn by_index_mut(&mut self, index: TaskIndex) -> Option<&mut Task> {
        self.open_by_index.get_mut(&index)
    }

    /// Inserts a new Open task indexed by both `index` and `digest`. Errors
    /// if the digest is already open or already finished.
    pub fn put_open(&mut self, task: Task) -> Result<(), StoreError> {
        if self.finished.contains_key(&task.digest) {
            return Err(StoreError::AlreadyFinished(task.digest));
        }
        if self.open_by_digest.contains_key(&task.digest) {
            return Err(StoreError::DuplicateDigest(task.digest));
        }
        self.open_by_digest.insert(task.digest, task.index);
        self.open_by_index.insert(task.index, task);
        Ok(())
    }

    /// Marks an open task Expired in place, leaving it queryable by index
    /// until the next [`Self::gc_expired`] sweep.
    pub fn mark_expired(&mut self, index: TaskIndex) {
        if let Some(task) = self.open_by_index.get_mut(&index) {
            task.state = TaskState::Expired;
        }
    }

    /// Moves a task from open to finished. The task must currently be
    /// open under `digest`; its state is stamped `Completed` on the way
    /// out.
    pub fn finish(
        &mut self,
        digest: TaskDigest,
        receipt: FinishedTask,
    ) -> Result<(), StoreError> {
        let index = self
            .open_by_digest
            .remove(&digest)
            .ok_or(StoreError::NoSuchOpenTask(digest))?;
        self.open_by_index.remove(&index);
        self.finished.insert(digest, receipt);
        Ok(())
    }

    /// Drops every Open task already marked Expired whose deadline has
    /// passed `now`, freeing its digest for re-admission. Returns the
    /// number of records removed.
    pub fn gc_expired(&mut self, now: std::time::SystemTime) -> usize {
        let expired: Vec<TaskIndex> = self
            .open_by_index
            .values()
            .filter(|t| t.state == TaskState::Expired && t.expires_at <= now)
            .map(|t| t.index)
            .collect();
        for index in &expired {
            if let Some(task) = self.open_by_index.remove(index) {
                self.open_by_digest.remove(&task.digest);
            }
        }
        expired.len()
    }
}
