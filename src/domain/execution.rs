// Execution domain model - one run attempt of a named dashboard search
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Highest progress a non-completed execution can report
pub const MAX_RUNNING_PROGRESS: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub search_id: String,
    pub dashboard_id: String,
    pub status: ExecutionStatus,
    pub progress: f64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub job_id: Option<String>,
    pub resolved_query: Option<String>,
    pub result_count: Option<u64>,
    pub error: Option<String>,
}

// Every mutator returns whether the record changed; terminal records never change.
impl Execution {
    pub fn new(search_id: impl Into<String>, dashboard_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            search_id: search_id.into(),
            dashboard_id: dashboard_id.into(),
            status: ExecutionStatus::Pending,
            progress: 0.0,
            message: None,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
            job_id: None,
            resolved_query: None,
            result_count: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn start(&mut self, progress: f64) -> bool {
        if self.status != ExecutionStatus::Pending {
            return false;
        }
        self.status = ExecutionStatus::Running;
        self.start_time = Some(Utc::now());
        self.progress = progress.clamp(0.0, MAX_RUNNING_PROGRESS);
        self.message = Some("started".to_string());
        true
    }

    /// Progress never decreases and stays below 1.0 until completion
    pub fn advance(&mut self, progress: f64, message: impl Into<String>) -> bool {
        if self.status != ExecutionStatus::Running {
            return false;
        }
        let message = message.into();
        let progress = if progress.is_nan() {
            self.progress
        } else {
            progress.clamp(self.progress, MAX_RUNNING_PROGRESS.max(self.progress))
        };
        if progress == self.progress && self.message.as_deref() == Some(message.as_str()) {
            return false;
        }
        self.progress = progress;
        self.message = Some(message);
        true
    }

    pub fn set_resolved_query(&mut self, query: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.resolved_query = Some(query.into());
        true
    }

    pub fn set_job_id(&mut self, job_id: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.job_id = Some(job_id.into());
        true
    }

    pub fn complete(&mut self, result_count: u64) -> bool {
        if self.status != ExecutionStatus::Running {
            return false;
        }
        self.status = ExecutionStatus::Completed;
        self.progress = 1.0;
        self.result_count = Some(result_count);
        self.message = Some(format!("completed with {} results", result_count));
        self.end_time = Some(Utc::now());
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let error = error.into();
        self.status = ExecutionStatus::Failed;
        self.message = Some(error.clone());
        self.error = Some(error);
        self.end_time = Some(Utc::now());
        true
    }

    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = ExecutionStatus::Cancelled;
        self.message = Some("cancelled".to_string());
        self.end_time = Some(Utc::now());
        true
    }

    pub fn duration_ms(&self) -> Option<i64> {
        let start = self.start_time.unwrap_or(self.created_at);
        self.end_time.map(|end| (end - start).num_milliseconds())
    }
}

/// Results payload handed to the persistence collaborator on completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub rows: Vec<BTreeMap<String, Value>>,
    pub fields: Vec<String>,
    pub metadata: serde_json::Map<String, Value>,
}

impl SearchResults {
    pub fn new(
        rows: Vec<BTreeMap<String, Value>>,
        fields: Vec<String>,
        metadata: serde_json::Map<String, Value>,
    ) -> Self {
        Self {
            rows,
            fields,
            metadata,
        }
    }
}
