// HTTP request handlers
use crate::application::error::{ParameterBuildFailure, SearchError, ValidationFailure};
use crate::application::execution_tracker::{CancelOutcome, ExecutionRequest};
use crate::application::parameter_builder::SearchParameterOverrides;
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::event::{EventEnvelope, ExecutionEvent};
use crate::domain::execution::Execution;
use crate::domain::refresh::RefreshInterval;
use crate::domain::search::TimeWindow;
use crate::infrastructure::event_stream::chunked_event_stream;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

pub fn status_for(err: &SearchError) -> StatusCode {
    match err {
        _ if err.is_not_found() => StatusCode::NOT_FOUND,
        SearchError::ParameterBuildFailed(ParameterBuildFailure::DashboardNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        SearchError::ValidationFailed(_)
        | SearchError::TokenResolutionFailed { .. }
        | SearchError::ParameterBuildFailed(_) => StatusCode::BAD_REQUEST,
        SearchError::RemoteFailed { .. } | SearchError::RemoteTimeout(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("request failed: {}", self.message);
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct SearchSummary {
    pub id: String,
    pub base: Option<String>,
    pub autostart: bool,
    pub refresh: Option<RefreshInterval>,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub searches: Vec<SearchSummary>,
}

impl From<&DashboardDefinition> for DashboardSummary {
    fn from(dashboard: &DashboardDefinition) -> Self {
        Self {
            id: dashboard.id.clone(),
            title: dashboard.title.clone(),
            description: dashboard.description.clone(),
            searches: dashboard
                .searches()
                .map(|s| SearchSummary {
                    id: s.id.clone(),
                    base: s.base.clone(),
                    autostart: dashboard.autostarts(s),
                    refresh: s.refresh_interval(),
                })
                .collect(),
        }
    }
}

/// Body of an execution request. A lone earliest or latest acts as an override.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionBody {
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    pub earliest: Option<String>,
    pub latest: Option<String>,
    #[serde(default)]
    pub overrides: SearchParameterOverrides,
}

impl ExecutionBody {
    pub fn into_request(self, dashboard_id: String, search_id: String) -> ExecutionRequest {
        let mut overrides = self.overrides;
        let time_window = match (self.earliest, self.latest) {
            (Some(earliest), Some(latest)) => Some(TimeWindow::new(earliest, latest)),
            (earliest, latest) => {
                overrides.earliest = overrides.earliest.or(earliest);
                overrides.latest = overrides.latest.or(latest);
                None
            }
        };
        ExecutionRequest {
            dashboard_id,
            search_id,
            tokens: self.tokens,
            time_window,
            overrides,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub dashboard: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_dashboards(State(state): State<Arc<AppState>>) -> Json<Vec<DashboardSummary>> {
    Json(
        state
            .dashboards
            .list()
            .iter()
            .map(|d| DashboardSummary::from(d.as_ref()))
            .collect(),
    )
}

pub async fn start_execution(
    Path((dashboard_id, search_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    body: Option<Json<ExecutionBody>>,
) -> Result<(StatusCode, Json<Execution>), ApiError> {
    if state.dashboards.get(&dashboard_id).is_none() {
        return Err(SearchError::from(ValidationFailure::DashboardNotFound(dashboard_id)).into());
    }
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let execution = state
        .tracker
        .execute(body.into_request(dashboard_id, search_id));
    Ok((StatusCode::ACCEPTED, Json(execution)))
}

pub async fn run_autostart(
    Path(dashboard_id): Path<String>,
    State(state): State<Arc<AppState>>,
    body: Option<Json<ExecutionBody>>,
) -> Result<Json<Vec<Execution>>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let template = body.into_request(dashboard_id.clone(), String::new());
    let executions = state.tracker.run_autostart(&dashboard_id, template).await?;
    Ok(Json(executions))
}

pub async fn list_executions(
    Query(query): Query<ListQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<Execution>> {
    Json(state.tracker.list(query.dashboard.as_deref()))
}

pub async fn get_execution(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Execution>, ApiError> {
    state
        .tracker
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("execution {} not found", id)))
}

pub async fn cancel_execution(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Execution>, ApiError> {
    match state.tracker.cancel(id) {
        CancelOutcome::Cancelled(execution) | CancelOutcome::AlreadyTerminal(execution) => {
            Ok(Json(execution))
        }
        CancelOutcome::NotFound => Err(ApiError::not_found(format!("execution {} not found", id))),
    }
}

pub async fn execution_results(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.results.load(id).await {
        Ok(Some(results)) => match json_response(&results, accepts_brotli(&headers)).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Ok(None) => ApiError::not_found(format!("no results stored for execution {}", id))
            .into_response(),
        Err(e) => ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", e),
        }
        .into_response(),
    }
}

fn ends_execution(envelope: &EventEnvelope) -> bool {
    match &envelope.event {
        ExecutionEvent::Completed { .. } | ExecutionEvent::Cancelled { .. } => true,
        ExecutionEvent::ProgressUpdated { status, .. } => status.is_terminal(),
        _ => false,
    }
}

/// Live events for one execution; the stream closes after its terminal event
pub async fn stream_events(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let events = state.tracker.subscribe_execution(id);
    let snapshot = match state.tracker.get(id) {
        Some(snapshot) => snapshot,
        None => return ApiError::not_found(format!("execution {} not found", id)).into_response(),
    };
    let already_done = snapshot.status.is_terminal();

    let stream = async_stream::stream! {
        if !already_done {
            futures::pin_mut!(events);
            while let Some(envelope) = events.next().await {
                let last = ends_execution(&envelope);
                yield envelope;
                if last {
                    break;
                }
            }
        }
    };

    match chunked_event_stream(stream, accepts_brotli(&headers)) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
