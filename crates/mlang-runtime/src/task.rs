//! Structured concurrency for systems.

use std::future::Future;

use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{Result, RuntimeError};

/// Owns every task a system spawns. Dropping the group aborts them all.
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: JoinSet<Result<()>>,
    spawned: usize,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.spawned += 1;
        self.tasks.spawn(task);
    }

    /// Number of tasks spawned so far.
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    /// Wait for every task. The first failure aborts the remaining tasks and
    /// is returned.
    pub async fn join(mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(err) if err.is_cancelled() => continue,
                Err(err) => RuntimeError::TaskFailed(err.to_string()),
            };
            debug!(error = %failure, "task failed, aborting the group");
            self.tasks.abort_all();
            return Err(failure);
        }
        Ok(())
    }
}
