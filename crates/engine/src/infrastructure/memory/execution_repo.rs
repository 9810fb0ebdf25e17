//! In-memory exploration execution store with TTL reaping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tablekeep_domain::{ExecutionId, ExplorationExecution};

use crate::infrastructure::ports::{ExecutionRepo, RepoError};

#[derive(Default)]
pub struct MemoryExecutionRepo {
    executions: DashMap<ExecutionId, ExplorationExecution>,
}

impl MemoryExecutionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionRepo for MemoryExecutionRepo {
    async fn get(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<ExplorationExecution>, RepoError> {
        Ok(self.executions.get(&execution_id).map(|entry| entry.clone()))
    }

    async fn save(&self, execution: &ExplorationExecution) -> Result<(), RepoError> {
        self.executions
            .insert(execution.execution_id(), execution.clone());
        Ok(())
    }

    async fn delete(&self, execution_id: ExecutionId) -> Result<(), RepoError> {
        self.executions.remove(&execution_id);
        Ok(())
    }

    async fn reap_stale(&self, cutoff: DateTime<Utc>) -> Result<u32, RepoError> {
        let before = self.executions.len();
        self.executions
            .retain(|_, execution| execution.is_terminal() || execution.started_at() >= cutoff);
        Ok((before - self.executions.len()) as u32)
    }
}
