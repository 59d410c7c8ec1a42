// Execution lifecycle events
use super::execution::ExecutionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionEvent {
    Started {
        execution_id: Uuid,
        dashboard_id: String,
        search_id: String,
    },
    ProgressUpdated {
        execution_id: Uuid,
        status: ExecutionStatus,
        progress: f64,
        message: Option<String>,
    },
    JobCreated {
        execution_id: Uuid,
        job_id: String,
    },
    Completed {
        execution_id: Uuid,
        result_count: u64,
        scan_count: u64,
        duration_ms: i64,
    },
    Cancelled {
        execution_id: Uuid,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> Uuid {
        match self {
            ExecutionEvent::Started { execution_id, .. }
            | ExecutionEvent::ProgressUpdated { execution_id, .. }
            | ExecutionEvent::JobCreated { execution_id, .. }
            | ExecutionEvent::Completed { execution_id, .. }
            | ExecutionEvent::Cancelled { execution_id } => *execution_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub execution_id: Uuid,
    pub event: ExecutionEvent,
}

impl From<ExecutionEvent> for EventEnvelope {
    fn from(event: ExecutionEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            execution_id: event.execution_id(),
            event,
        }
    }
}
