// Test doubles for the search gateway and tracker wiring
use crate::application::execution_store::ResultSink;
use crate::application::execution_tracker::{ExecutionTracker, TrackerSettings};
use crate::application::parameter_builder::SearchParameterBuilder;
use crate::application::progress_publisher::ProgressPublisher;
use crate::application::search_gateway::{JobHandle, JobStatus, Namespace, SearchGateway};
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::execution::SearchResults;
use crate::domain::search::TimeRange;
use crate::infrastructure::file_dashboards::FileDashboardRepository;
use crate::infrastructure::memory_store::{InMemoryExecutionStore, InMemoryResultSink};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub query: String,
    pub time_range: TimeRange,
    pub namespace: Namespace,
    pub extra_params: Vec<(String, String)>,
}

#[derive(Default)]
struct Recorded {
    submissions: Vec<Submission>,
    polls: usize,
    polls_per_job: HashMap<String, usize>,
    cancelled: Vec<String>,
}

/// Replays a fixed status sequence per job; the last status repeats forever.
#[derive(Clone)]
pub struct ScriptedGateway {
    statuses: Vec<JobStatus>,
    submit_error: Option<String>,
    recorded: Arc<Mutex<Recorded>>,
}

impl ScriptedGateway {
    pub fn new(statuses: Vec<JobStatus>) -> Self {
        Self {
            statuses,
            submit_error: None,
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    pub fn failing_submit(message: &str) -> Self {
        Self {
            submit_error: Some(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.recorded.lock().unwrap().submissions.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.recorded.lock().unwrap().polls
    }

    pub fn cancelled_jobs(&self) -> Vec<String> {
        self.recorded.lock().unwrap().cancelled.clone()
    }
}

#[async_trait]
impl SearchGateway for ScriptedGateway {
    async fn submit(
        &self,
        query: &str,
        time_range: &TimeRange,
        namespace: &Namespace,
        extra_params: &[(String, String)],
    ) -> anyhow::Result<JobHandle> {
        if let Some(message) = &self.submit_error {
            anyhow::bail!("{}", message);
        }
        let mut recorded = self.recorded.lock().unwrap();
        recorded.submissions.push(Submission {
            query: query.to_string(),
            time_range: time_range.clone(),
            namespace: namespace.clone(),
            extra_params: extra_params.to_vec(),
        });
        Ok(JobHandle::new(format!("job-{}", recorded.submissions.len())))
    }

    async fn poll_status(&self, job: &JobHandle) -> anyhow::Result<JobStatus> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.polls += 1;
        let seen = recorded.polls_per_job.entry(job.sid.clone()).or_insert(0);
        let index = (*seen).min(self.statuses.len().saturating_sub(1));
        *seen += 1;
        self.statuses
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no scripted status"))
    }

    async fn fetch_results(
        &self,
        _job: &JobHandle,
        _offset: u64,
        count: u64,
    ) -> anyhow::Result<SearchResults> {
        let rows: Vec<BTreeMap<String, serde_json::Value>> = (0..2u64.min(count))
            .map(|i| BTreeMap::from([("count".to_string(), json!(i.to_string()))]))
            .collect();
        Ok(SearchResults::new(
            rows,
            vec!["count".to_string()],
            serde_json::Map::new(),
        ))
    }

    async fn cancel(&self, job: &JobHandle) -> anyhow::Result<()> {
        self.recorded.lock().unwrap().cancelled.push(job.sid.clone());
        Ok(())
    }
}

/// Tracker over in-memory stores with a short poll interval
pub fn tracker_with(
    dashboard: DashboardDefinition,
    gateway: ScriptedGateway,
) -> (ExecutionTracker, Arc<InMemoryResultSink>) {
    let results = Arc::new(InMemoryResultSink::new());
    let sink: Arc<dyn ResultSink> = results.clone();
    let tracker = ExecutionTracker::new(
        Arc::new(FileDashboardRepository::from_definitions(vec![dashboard])),
        Arc::new(gateway),
        Arc::new(InMemoryExecutionStore::new()),
        sink,
        ProgressPublisher::new(1024),
        SearchParameterBuilder::default(),
        TrackerSettings {
            poll_interval: Duration::from_millis(5),
            ..TrackerSettings::default()
        },
    );
    (tracker, results)
}
