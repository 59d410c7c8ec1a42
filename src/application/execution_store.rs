// Execution snapshot store and result sink traits
use crate::domain::execution::{Execution, SearchResults};
use async_trait::async_trait;
use uuid::Uuid;

/// Snapshot store. Only the owning tracker writes a record; any number of readers.
pub trait ExecutionStore: Send + Sync {
    fn insert(&self, execution: Execution);

    fn get(&self, id: Uuid) -> Option<Execution>;

    /// Apply `change` to a record while holding its exclusive lock. Returns the
    /// new snapshot when `change` reports a modification.
    fn update(&self, id: Uuid, change: &mut dyn FnMut(&mut Execution) -> bool)
    -> Option<Execution>;

    fn list(&self, dashboard_id: Option<&str>) -> Vec<Execution>;

    /// Most recent completed execution of a search that holds a remote job id
    fn latest_completed(&self, dashboard_id: &str, search_id: &str) -> Option<Execution>;
}

/// Persistence collaborator for completed result payloads
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn store(&self, execution_id: Uuid, results: SearchResults) -> anyhow::Result<()>;

    async fn load(&self, execution_id: Uuid) -> anyhow::Result<Option<SearchResults>>;
}
