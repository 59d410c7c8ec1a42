// In-memory execution snapshots and result payloads
use crate::application::execution_store::{ExecutionStore, ResultSink};
use crate::domain::execution::{Execution, ExecutionStatus, SearchResults};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

type Record = Arc<RwLock<Execution>>;

/// Each record has its own lock; the outer map is only write-locked on insert.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    records: RwLock<HashMap<Uuid, Record>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: Uuid) -> Option<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn snapshots(&self) -> Vec<Execution> {
        let records: Vec<Record> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records
            .iter()
            .map(|r| r.read().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }
}

impl ExecutionStore for InMemoryExecutionStore {
    fn insert(&self, execution: Execution) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(execution.id, Arc::new(RwLock::new(execution)));
    }

    fn get(&self, id: Uuid) -> Option<Execution> {
        self.record(id)
            .map(|r| r.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn update(
        &self,
        id: Uuid,
        change: &mut dyn FnMut(&mut Execution) -> bool,
    ) -> Option<Execution> {
        let record = self.record(id)?;
        let mut execution = record.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut execution).then(|| execution.clone())
    }

    fn list(&self, dashboard_id: Option<&str>) -> Vec<Execution> {
        let mut executions: Vec<Execution> = self
            .snapshots()
            .into_iter()
            .filter(|e| dashboard_id.is_none_or(|d| e.dashboard_id == d))
            .collect();
        executions.sort_by_key(|e| e.created_at);
        executions
    }

    // Ties on end time have no defined order.
    fn latest_completed(&self, dashboard_id: &str, search_id: &str) -> Option<Execution> {
        self.snapshots()
            .into_iter()
            .filter(|e| {
                e.status == ExecutionStatus::Completed
                    && e.job_id.is_some()
                    && e.dashboard_id == dashboard_id
                    && e.search_id == search_id
            })
            .max_by_key(|e| e.end_time)
    }
}

#[derive(Default)]
pub struct InMemoryResultSink {
    results: tokio::sync::RwLock<HashMap<Uuid, SearchResults>>,
}

impl InMemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultSink for InMemoryResultSink {
    async fn store(&self, execution_id: Uuid, results: SearchResults) -> anyhow::Result<()> {
        tracing::debug!(
            "storing {} result rows for execution {}",
            results.rows.len(),
            execution_id
        );
        self.results.write().await.insert(execution_id, results);
        Ok(())
    }

    async fn load(&self, execution_id: Uuid) -> anyhow::Result<Option<SearchResults>> {
        Ok(self.results.read().await.get(&execution_id).cloned())
    }
}
