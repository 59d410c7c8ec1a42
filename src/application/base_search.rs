// Base search chaining - pipe a search from a completed base job via `loadjob`
use crate::application::error::SearchError;
use crate::application::execution_store::ExecutionStore;
use crate::application::parameter_builder::ResolvedParameters;

pub struct BaseSearchChainer<'a> {
    store: &'a dyn ExecutionStore,
}

impl<'a> BaseSearchChainer<'a> {
    pub fn new(store: &'a dyn ExecutionStore) -> Self {
        Self { store }
    }

    /// Job id of the most recent completed run of the base search
    pub fn resolve_base_job(
        &self,
        dashboard_id: &str,
        base_search_id: &str,
    ) -> Result<String, SearchError> {
        self.store
            .latest_completed(dashboard_id, base_search_id)
            .and_then(|execution| execution.job_id)
            .ok_or_else(|| SearchError::BaseSearchUnresolved {
                base_search_id: base_search_id.to_string(),
            })
    }
}

/// `search | stats count` -> `| loadjob <job> | stats count`
pub fn rewrite_query(query: &str, job_id: &str) -> String {
    let mut rest = query.trim_start();
    if rest
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("search "))
    {
        rest = rest[7..].trim_start();
    }
    if let Some(stripped) = rest.strip_prefix('|') {
        rest = stripped.trim_start();
    }
    format!("| loadjob {} | {}", job_id, rest)
}

/// Rewrite the query onto the base job and drop the time bounds
pub fn chain(mut params: ResolvedParameters, job_id: &str) -> ResolvedParameters {
    params.query = rewrite_query(&params.query, job_id);
    params.earliest = None;
    params.latest = None;
    params
}
