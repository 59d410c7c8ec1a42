// Search gateway trait - remote job submission, polling and result retrieval
use crate::domain::execution::SearchResults;
use crate::domain::search::TimeRange;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub sid: String,
}

impl JobHandle {
    pub fn new(sid: impl Into<String>) -> Self {
        Self { sid: sid.into() }
    }
}

/// App/owner namespace a job is dispatched in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub app: String,
    pub owner: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    Queued,
    Parsing,
    Running,
    Finalizing,
    Paused,
    Done,
    Failed,
    Unknown,
}

impl DispatchState {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "QUEUED" => DispatchState::Queued,
            "PARSING" => DispatchState::Parsing,
            "RUNNING" => DispatchState::Running,
            "FINALIZING" => DispatchState::Finalizing,
            "PAUSED" => DispatchState::Paused,
            "DONE" => DispatchState::Done,
            "FAILED" => DispatchState::Failed,
            _ => DispatchState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub dispatch_state: DispatchState,
    pub done_fraction: f64,
    pub scan_count: u64,
    pub event_count: u64,
    pub result_count: u64,
    pub is_done: bool,
    pub is_failed: bool,
    pub messages: Vec<String>,
}

impl JobStatus {
    pub fn new(dispatch_state: DispatchState, done_fraction: f64) -> Self {
        Self {
            dispatch_state,
            done_fraction,
            scan_count: 0,
            event_count: 0,
            result_count: 0,
            is_done: dispatch_state == DispatchState::Done,
            is_failed: dispatch_state == DispatchState::Failed,
            messages: Vec::new(),
        }
    }

    /// Backend progress clamped into [0, 1]
    pub fn progress(&self) -> f64 {
        if self.done_fraction.is_nan() {
            0.0
        } else {
            self.done_fraction.clamp(0.0, 1.0)
        }
    }
}

#[async_trait]
pub trait SearchGateway: Send + Sync {
    /// Dispatch a query and return its remote job handle
    async fn submit(
        &self,
        query: &str,
        time_range: &TimeRange,
        namespace: &Namespace,
        extra_params: &[(String, String)],
    ) -> anyhow::Result<JobHandle>;

    async fn poll_status(&self, job: &JobHandle) -> anyhow::Result<JobStatus>;

    async fn fetch_results(
        &self,
        job: &JobHandle,
        offset: u64,
        count: u64,
    ) -> anyhow::Result<SearchResults>;

    /// Abort a running job. Gateways without a true abort keep the default no-op.
    async fn cancel(&self, _job: &JobHandle) -> anyhow::Result<()> {
        Ok(())
    }
}
