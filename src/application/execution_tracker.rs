// Execution tracker - drives one search execution through its lifecycle stages
use crate::application::base_search::{chain, BaseSearchChainer};
use crate::application::dashboard_repository::DashboardRepository;
use crate::application::discovery::discover_search;
use crate::application::error::{SearchError, ValidationFailure};
use crate::application::execution_store::{ExecutionStore, ResultSink};
use crate::application::parameter_builder::{
    ParameterInputs, ResolvedParameters, SearchParameterBuilder, SearchParameterOverrides,
};
use crate::application::progress_publisher::ProgressPublisher;
use crate::application::search_gateway::{DispatchState, JobHandle, JobStatus, Namespace, SearchGateway};
use crate::application::token_resolver::TokenResolver;
use crate::domain::event::{EventEnvelope, ExecutionEvent};
use crate::domain::execution::Execution;
use crate::domain::search::{TimeRange, TimeWindow};
use futures::Stream;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

// Progress checkpoints
const STARTED: f64 = 0.1;
const TOKENS_RESOLVED: f64 = 0.2;
const PARAMETERS_BUILT: f64 = 0.3;
const SUBMITTING: f64 = 0.4;
const SUBMITTED: f64 = 0.6;
const POLL_BAND_START: f64 = 0.7;
const POLL_BAND_END: f64 = 0.95;
const FETCHING: f64 = 0.95;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionRequest {
    pub dashboard_id: String,
    pub search_id: String,
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    #[serde(default)]
    pub overrides: SearchParameterOverrides,
}

impl ExecutionRequest {
    pub fn new(dashboard_id: impl Into<String>, search_id: impl Into<String>) -> Self {
        Self {
            dashboard_id: dashboard_id.into(),
            search_id: search_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    /// Upstream budget for a remote job; None polls until the job finishes
    pub remote_timeout: Option<Duration>,
    pub results_page_size: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            remote_timeout: None,
            results_page_size: 50_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled(Execution),
    AlreadyTerminal(Execution),
    NotFound,
}

enum Interrupt {
    Cancelled,
    Failed(SearchError),
}

impl From<SearchError> for Interrupt {
    fn from(err: SearchError) -> Self {
        Interrupt::Failed(err)
    }
}

type StageResult<T> = Result<T, Interrupt>;

#[derive(Clone)]
pub struct ExecutionTracker {
    dashboards: Arc<dyn DashboardRepository>,
    gateway: Arc<dyn SearchGateway>,
    store: Arc<dyn ExecutionStore>,
    results: Arc<dyn ResultSink>,
    publisher: ProgressPublisher,
    parameters: SearchParameterBuilder,
    settings: TrackerSettings,
    cancellations: Arc<StdMutex<HashMap<Uuid, CancellationToken>>>,
}

impl ExecutionTracker {
    pub fn new(
        dashboards: Arc<dyn DashboardRepository>,
        gateway: Arc<dyn SearchGateway>,
        store: Arc<dyn ExecutionStore>,
        results: Arc<dyn ResultSink>,
        publisher: ProgressPublisher,
        parameters: SearchParameterBuilder,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            dashboards,
            gateway,
            store,
            results,
            publisher,
            parameters,
            settings,
            cancellations: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Create a pending execution and run it in the background
    pub fn execute(&self, request: ExecutionRequest) -> Execution {
        let (execution, run) = self.prepare(request);
        tokio::spawn(run);
        execution
    }

    /// Create an execution and wait for it to reach a terminal state. The run
    /// is detached from the caller, so dropping this future does not strand it.
    pub async fn run_to_completion(&self, request: ExecutionRequest) -> Execution {
        let (execution, run) = self.prepare(request);
        let id = execution.id;
        if let Err(e) = tokio::spawn(run).await {
            self.fail(id, &SearchError::Unexpected(format!("execution task aborted: {}", e)));
            self.forget(id);
        }
        self.store.get(id).unwrap_or(execution)
    }

    /// Run every autostart search of a dashboard. Searches chained on a base
    /// wait until the base has run in an earlier wave.
    pub async fn run_autostart(
        &self,
        dashboard_id: &str,
        template: ExecutionRequest,
    ) -> Result<Vec<Execution>, SearchError> {
        let dashboard = self
            .dashboards
            .get(dashboard_id)
            .ok_or_else(|| ValidationFailure::DashboardNotFound(dashboard_id.to_string()))?;

        let mut pending: Vec<(String, Option<String>)> = dashboard
            .searches()
            .filter(|s| {
                template
                    .overrides
                    .autostart
                    .unwrap_or_else(|| dashboard.autostarts(s))
            })
            .map(|s| (s.id.clone(), s.base.clone()))
            .collect();
        let autostart_ids: HashSet<String> = pending.iter().map(|(id, _)| id.clone()).collect();
        let mut finished: HashSet<String> = HashSet::new();
        let mut executions = Vec::new();

        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|(_, base)| match base {
                    None => true,
                    Some(base) => finished.contains(base) || !autostart_ids.contains(base),
                });
            // A dependency cycle leaves nothing ready; run the rest and let chaining report it.
            let (wave, rest) = if ready.is_empty() {
                (waiting, Vec::new())
            } else {
                (ready, waiting)
            };

            tracing::debug!("autostart wave for {}: {} searches", dashboard_id, wave.len());
            let runs = wave.iter().map(|(search_id, _)| {
                self.run_to_completion(ExecutionRequest {
                    dashboard_id: dashboard_id.to_string(),
                    search_id: search_id.clone(),
                    ..template.clone()
                })
            });
            for execution in futures::future::join_all(runs).await {
                finished.insert(execution.search_id.clone());
                executions.push(execution);
            }
            pending = rest;
        }

        Ok(executions)
    }

    pub fn get(&self, id: Uuid) -> Option<Execution> {
        self.store.get(id)
    }

    pub fn list(&self, dashboard_id: Option<&str>) -> Vec<Execution> {
        self.store.list(dashboard_id)
    }

    pub fn subscribe(&self) -> Receiver<EventEnvelope> {
        self.publisher.subscribe()
    }

    pub fn subscribe_execution(
        &self,
        execution_id: Uuid,
    ) -> impl Stream<Item = EventEnvelope> + Send + 'static {
        self.publisher.subscribe_execution(execution_id)
    }

    /// Advisory cancel: marks the record cancelled and stops further polling.
    /// Transitions already applied are kept.
    pub fn cancel(&self, id: Uuid) -> CancelOutcome {
        let cancelled = self.transition(
            id,
            |e| e.cancel(),
            |_| Some(ExecutionEvent::Cancelled { execution_id: id }),
        );
        match cancelled {
            Some(snapshot) => {
                if let Some(token) = self.cancellation(id) {
                    token.cancel();
                }
                tracing::info!("execution {} cancelled", id);
                CancelOutcome::Cancelled(snapshot)
            }
            None => match self.store.get(id) {
                Some(snapshot) => CancelOutcome::AlreadyTerminal(snapshot),
                None => CancelOutcome::NotFound,
            },
        }
    }

    fn forget(&self, id: Uuid) {
        self.cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn cancellation(&self, id: Uuid) -> Option<CancellationToken> {
        self.cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn prepare(
        &self,
        request: ExecutionRequest,
    ) -> (Execution, impl Future<Output = ()> + Send + 'static) {
        let execution = Execution::new(&request.search_id, &request.dashboard_id);
        let id = execution.id;
        let token = CancellationToken::new();
        self.cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, token.clone());
        self.store.insert(execution.clone());

        let span = tracing::info_span!(
            "execution",
            execution_id = %id,
            dashboard_id = %request.dashboard_id,
            search_id = %request.search_id
        );
        let tracker = self.clone();
        let run = async move {
            tracker.run(id, request, token).await;
            tracker.forget(id);
        }
        .instrument(span);

        (execution, run)
    }

    async fn run(&self, id: Uuid, request: ExecutionRequest, token: CancellationToken) {
        let started = self.transition(
            id,
            |e| e.start(STARTED),
            |e| {
                Some(ExecutionEvent::Started {
                    execution_id: id,
                    dashboard_id: e.dashboard_id.clone(),
                    search_id: e.search_id.clone(),
                })
            },
        );
        if started.is_none() {
            tracing::debug!("execution {} cancelled before start", id);
            return;
        }
        tracing::info!("execution started");

        match self.drive(id, &request, &token).await {
            Ok(()) => {}
            Err(Interrupt::Cancelled) => {
                tracing::debug!("execution {} stopped after cancellation", id);
            }
            Err(Interrupt::Failed(err)) => self.fail(id, &err),
        }
    }

    async fn drive(
        &self,
        id: Uuid,
        request: &ExecutionRequest,
        token: &CancellationToken,
    ) -> StageResult<()> {
        let started = Instant::now();

        // 1. discovery and validation; the dashboard snapshot is held from here on
        let dashboard = self.dashboards.get(&request.dashboard_id);
        let found = discover_search(
            &request.dashboard_id,
            dashboard.as_deref(),
            &request.search_id,
            &request.tokens,
            request.time_window.as_ref(),
        )?;
        let search = found.search;

        // 2. base job lookup
        let base_job = match &search.base {
            Some(base) => Some(
                BaseSearchChainer::new(self.store.as_ref())
                    .resolve_base_job(&request.dashboard_id, base)?,
            ),
            None => None,
        };

        // 3. token resolution
        let resolution =
            TokenResolver::new(found.dashboard, &request.tokens, request.time_window.as_ref())
                .resolve_search(search);
        if !resolution.is_complete() {
            return Err(SearchError::TokenResolutionFailed {
                unresolved: resolution.unresolved,
            }
            .into());
        }
        self.progress(id, TOKENS_RESOLVED, "tokens resolved");

        // 4. parameters
        let params = self
            .parameters
            .build(ParameterInputs {
                dashboard_id: &request.dashboard_id,
                dashboard: Some(found.dashboard),
                search,
                resolution: &resolution,
                time_window: request.time_window.as_ref(),
                overrides: &request.overrides,
            })
            .map_err(SearchError::from)?;
        for issue in &params.issues {
            tracing::warn!("parameter issue: {}", issue);
        }
        self.progress(id, PARAMETERS_BUILT, "parameters built");

        // 5. chained rewrite
        let params = match &base_job {
            Some(job_id) => chain(params, job_id),
            None => params,
        };
        self.transition(id, |e| e.set_resolved_query(&params.query), |_| None);
        ensure_active(token)?;

        // 6. submission
        self.progress(id, SUBMITTING, "submitting search");
        let job = self.submit(&params, token).await?;
        let recorded = self.transition(
            id,
            |e| e.set_job_id(&job.sid),
            |_| {
                Some(ExecutionEvent::JobCreated {
                    execution_id: id,
                    job_id: job.sid.clone(),
                })
            },
        );
        if recorded.is_none() {
            self.abort_remote(&job).await;
            return Err(Interrupt::Cancelled);
        }
        self.progress(id, SUBMITTED, "search job created");

        // 7. polling
        let status = match self.poll_until_done(id, &job, token).await {
            Err(Interrupt::Cancelled) => {
                self.abort_remote(&job).await;
                return Err(Interrupt::Cancelled);
            }
            other => other?,
        };

        // 8. results
        self.progress(id, FETCHING, "fetching results");
        let page = params.max_count.min(self.settings.results_page_size);
        let mut results = cancellable(
            token,
            self.gateway.fetch_results(&job, params.offset, page),
        )
        .await?
        .map_err(SearchError::remote)?;
        let result_count = results.rows.len() as u64;
        // the gateway always speaks JSON; the requested rendering travels with the payload
        results.metadata.insert(
            "output_mode".to_string(),
            params.output_mode.as_str().into(),
        );
        results.metadata.insert(
            "dashboard_title".to_string(),
            params.dashboard_title.clone().into(),
        );
        self.results
            .store(id, results)
            .await
            .map_err(|e| SearchError::Unexpected(format!("{:#}", e)))?;

        // 9. completion
        let elapsed_ms = started.elapsed().as_millis() as i64;
        let Some(snapshot) = self.transition(
            id,
            |e| e.complete(result_count),
            |e| {
                Some(ExecutionEvent::Completed {
                    execution_id: id,
                    result_count,
                    scan_count: status.scan_count,
                    duration_ms: e.duration_ms().unwrap_or(elapsed_ms),
                })
            },
        ) else {
            return Err(Interrupt::Cancelled);
        };
        tracing::info!(
            "execution completed: {} results, {} scanned in {}ms",
            result_count,
            status.scan_count,
            snapshot.duration_ms().unwrap_or(elapsed_ms)
        );
        Ok(())
    }

    async fn submit(
        &self,
        params: &ResolvedParameters,
        token: &CancellationToken,
    ) -> StageResult<JobHandle> {
        let time_range = TimeRange {
            earliest: params.earliest.clone(),
            latest: params.latest.clone(),
        };
        let namespace = Namespace {
            app: params.context.app.clone(),
            owner: params.context.owner.clone(),
        };
        let extra_params = vec![
            (
                "adhoc_search_level".to_string(),
                params.search_mode.as_str().to_string(),
            ),
            ("max_count".to_string(), params.max_count.to_string()),
            ("timeout".to_string(), params.context.timeout_secs.to_string()),
        ];

        let job = cancellable(
            token,
            self.gateway
                .submit(&params.query, &time_range, &namespace, &extra_params),
        )
        .await?
        .map_err(SearchError::remote)?;
        tracing::debug!("submitted remote job {}", job.sid);
        Ok(job)
    }

    /// Poll with a fixed interval until the job is done or failed
    async fn poll_until_done(
        &self,
        id: Uuid,
        job: &JobHandle,
        token: &CancellationToken,
    ) -> StageResult<JobStatus> {
        let started = Instant::now();
        loop {
            let status = cancellable(token, self.gateway.poll_status(job))
                .await?
                .map_err(SearchError::remote)?;
            let fraction = status.progress();
            tracing::debug!(
                "job {} state {:?} at {:.0}%",
                job.sid,
                status.dispatch_state,
                fraction * 100.0
            );

            match status.dispatch_state {
                DispatchState::Done => return Ok(status),
                DispatchState::Failed => {
                    let messages = if status.messages.is_empty() {
                        vec![format!("remote job {} failed", job.sid)]
                    } else {
                        status.messages
                    };
                    return Err(SearchError::RemoteFailed { messages }.into());
                }
                _ => {}
            }

            let progress = POLL_BAND_START + fraction * (POLL_BAND_END - POLL_BAND_START);
            self.progress(
                id,
                progress,
                format!(
                    "{:?} ({:.0}%)",
                    status.dispatch_state,
                    fraction * 100.0
                )
                .to_lowercase(),
            );

            if let Some(budget) = self.settings.remote_timeout {
                if started.elapsed() >= budget {
                    self.abort_remote(job).await;
                    return Err(SearchError::RemoteTimeout(budget).into());
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Interrupt::Cancelled),
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }

    async fn abort_remote(&self, job: &JobHandle) {
        if let Err(e) = self.gateway.cancel(job).await {
            tracing::warn!("failed to cancel remote job {}: {:#}", job.sid, e);
        }
    }

    /// Apply `change` and publish its event while the record is still locked,
    /// so per-execution event order always matches transition order.
    fn transition(
        &self,
        id: Uuid,
        mut change: impl FnMut(&mut Execution) -> bool,
        announce: impl Fn(&Execution) -> Option<ExecutionEvent>,
    ) -> Option<Execution> {
        let publisher = &self.publisher;
        self.store.update(id, &mut |execution| {
            let changed = change(execution);
            if changed {
                if let Some(event) = announce(execution) {
                    publisher.publish(event);
                }
            }
            changed
        })
    }

    fn progress(&self, id: Uuid, progress: f64, message: impl Into<String>) {
        let message = message.into();
        self.transition(
            id,
            |e| e.advance(progress, message.as_str()),
            progress_event,
        );
    }

    fn fail(&self, id: Uuid, err: &SearchError) {
        let message = err.to_string();
        if self
            .transition(id, |e| e.fail(message.as_str()), progress_event)
            .is_some()
        {
            tracing::error!("execution failed: {}", message);
        }
    }
}

fn progress_event(execution: &Execution) -> Option<ExecutionEvent> {
    Some(ExecutionEvent::ProgressUpdated {
        execution_id: execution.id,
        status: execution.status,
        progress: execution.progress,
        message: execution.message.clone(),
    })
}

fn ensure_active(token: &CancellationToken) -> StageResult<()> {
    if token.is_cancelled() {
        Err(Interrupt::Cancelled)
    } else {
        Ok(())
    }
}

async fn cancellable<T>(
    token: &CancellationToken,
    future: impl Future<Output = T>,
) -> StageResult<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Interrupt::Cancelled),
        value = future => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{ScriptedGateway, tracker_with};
    use crate::domain::execution::ExecutionStatus;
    use crate::infrastructure::file_dashboards::FileDashboardRepository;
    use crate::infrastructure::memory_store::{InMemoryExecutionStore, InMemoryResultSink};
    use crate::domain::dashboard::DashboardDefinition;
    use crate::domain::search::SearchDefinition;
    use crate::domain::token::{TokenDefinition, TokenType};

    fn chained_dashboard() -> DashboardDefinition {
        DashboardDefinition::new("ops", "Operations")
            .with_search(SearchDefinition::new("base", "index=main"))
            .with_search(SearchDefinition::new("dependent", "| stats count").with_base("base"))
    }

    fn collect_events(rx: &mut Receiver<EventEnvelope>) -> Vec<ExecutionEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    #[tokio::test]
    async fn test_completes_with_checkpoints_in_order() {
        let gateway = ScriptedGateway::new(vec![
            JobStatus::new(DispatchState::Queued, 0.0),
            JobStatus::new(DispatchState::Running, 0.5),
            JobStatus::new(DispatchState::Done, 1.0),
        ]);
        let (tracker, results) = tracker_with(chained_dashboard(), gateway.clone());
        let mut rx = tracker.subscribe();

        let execution = tracker.run_to_completion(ExecutionRequest::new("ops", "base")).await;
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.progress, 1.0);
        assert_eq!(execution.result_count, Some(2));
        assert_eq!(execution.job_id.as_deref(), Some("job-1"));
        assert!(execution.end_time.is_some());
        let stored = results.load(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata["output_mode"], "json");
        assert_eq!(stored.metadata["dashboard_title"], "Operations");

        let events = collect_events(&mut rx);
        assert!(matches!(events.first(), Some(ExecutionEvent::Started { .. })));
        assert!(matches!(events.last(), Some(ExecutionEvent::Completed { result_count: 2, .. })));

        let progress: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::ProgressUpdated { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        for checkpoint in [TOKENS_RESOLVED, PARAMETERS_BUILT, SUBMITTING, SUBMITTED, FETCHING] {
            assert!(progress.contains(&checkpoint), "missing checkpoint {}", checkpoint);
        }
        assert!(progress.iter().any(|p| (p - 0.825).abs() < 1e-9));
        assert!(progress.iter().all(|p| *p < 1.0));

        let job_created = events
            .iter()
            .position(|e| matches!(e, ExecutionEvent::JobCreated { .. }))
            .unwrap();
        let submitted = events
            .iter()
            .position(|e| matches!(e, ExecutionEvent::ProgressUpdated { progress, .. } if *progress == SUBMITTED))
            .unwrap();
        assert!(job_created < submitted);
    }

    #[tokio::test]
    async fn test_dependent_before_base_fails_without_submission() {
        let gateway = ScriptedGateway::new(vec![JobStatus::new(DispatchState::Done, 1.0)]);
        let (tracker, _) = tracker_with(chained_dashboard(), gateway.clone());

        let execution = tracker
            .run_to_completion(ExecutionRequest::new("ops", "dependent"))
            .await;
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(
            execution.error.as_deref(),
            Some("base search 'base' not yet executed")
        );
        assert!(execution.end_time.is_some());
        assert!(gateway.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_dependent_after_base_pipes_from_job() {
        let gateway = ScriptedGateway::new(vec![JobStatus::new(DispatchState::Done, 1.0)]);
        let (tracker, _) = tracker_with(chained_dashboard(), gateway.clone());

        let base = tracker.run_to_completion(ExecutionRequest::new("ops", "base")).await;
        assert_eq!(base.status, ExecutionStatus::Completed);
        let base_job = base.job_id.unwrap();

        let dependent = tracker
            .run_to_completion(ExecutionRequest::new("ops", "dependent"))
            .await;
        assert_eq!(dependent.status, ExecutionStatus::Completed);
        let expected = format!("| loadjob {} | stats count", base_job);
        assert_eq!(dependent.resolved_query.as_deref(), Some(expected.as_str()));

        let submissions = gateway.submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[1].query, expected);
        assert_eq!(submissions[1].time_range, TimeRange::default());
        assert!(submissions[0].time_range.earliest.is_some());
    }

    #[tokio::test]
    async fn test_wildcard_default_resolves_fully() {
        let dashboard = DashboardDefinition::new("ops", "Operations")
            .with_token(TokenDefinition::new("env", TokenType::Text))
            .with_search(SearchDefinition::new("by_env", "index=main env=$env$"));
        let gateway = ScriptedGateway::new(vec![JobStatus::new(DispatchState::Done, 1.0)]);
        let (tracker, _) = tracker_with(dashboard, gateway.clone());

        let execution = tracker.run_to_completion(ExecutionRequest::new("ops", "by_env")).await;
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.resolved_query.as_deref(), Some("index=main env=*"));
    }

    #[tokio::test]
    async fn test_remote_failure_aggregates_messages() {
        let mut failed = JobStatus::new(DispatchState::Failed, 0.3);
        failed.messages = vec!["Unknown command 'statz'".to_string(), "parse error".to_string()];
        let gateway = ScriptedGateway::new(vec![JobStatus::new(DispatchState::Running, 0.1), failed]);
        let (tracker, _) = tracker_with(chained_dashboard(), gateway);
        let mut rx = tracker.subscribe();

        let execution = tracker.run_to_completion(ExecutionRequest::new("ops", "base")).await;
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(
            execution.error.as_deref(),
            Some("remote search failed: Unknown command 'statz'; parse error")
        );
        assert!(execution.progress < 1.0);

        let events = collect_events(&mut rx);
        assert!(matches!(
            events.last(),
            Some(ExecutionEvent::ProgressUpdated { status: ExecutionStatus::Failed, .. })
        ));
    }

    #[tokio::test]
    async fn test_submission_error_fails_execution() {
        let gateway = ScriptedGateway::failing_submit("connection refused");
        let (tracker, _) = tracker_with(chained_dashboard(), gateway);

        let execution = tracker.run_to_completion(ExecutionRequest::new("ops", "base")).await;
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_unknown_search_fails() {
        let gateway = ScriptedGateway::new(Vec::new());
        let (tracker, _) = tracker_with(chained_dashboard(), gateway);

        let execution = tracker.run_to_completion(ExecutionRequest::new("ops", "nope")).await;
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_remote_timeout() {
        let gateway = ScriptedGateway::new(vec![JobStatus::new(DispatchState::Running, 0.2)]);
        let (tracker, _) = tracker_with(chained_dashboard(), gateway.clone());
        let tracker = ExecutionTracker {
            settings: TrackerSettings {
                remote_timeout: Some(Duration::from_millis(30)),
                ..tracker.settings.clone()
            },
            ..tracker
        };

        let execution = tracker.run_to_completion(ExecutionRequest::new("ops", "base")).await;
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error.unwrap().contains("did not finish"));
        assert_eq!(gateway.cancelled_jobs(), vec!["job-1".to_string()]);
    }

    #[tokio::test]
    async fn test_cancel_stops_polling() {
        let gateway = ScriptedGateway::new(vec![JobStatus::new(DispatchState::Running, 0.2)]);
        let (tracker, _) = tracker_with(chained_dashboard(), gateway.clone());
        let mut rx = tracker.subscribe();

        let pending = tracker.execute(ExecutionRequest::new("ops", "base"));
        assert_eq!(pending.status, ExecutionStatus::Pending);

        // wait until the job exists and polling has begun
        loop {
            match rx.recv().await.unwrap().event {
                ExecutionEvent::ProgressUpdated { progress, .. } if progress >= POLL_BAND_START => break,
                _ => {}
            }
        }

        let outcome = tracker.cancel(pending.id);
        let CancelOutcome::Cancelled(snapshot) = outcome else {
            panic!("expected cancellation, got {:?}", outcome);
        };
        assert_eq!(snapshot.status, ExecutionStatus::Cancelled);
        let progress_at_cancel = snapshot.progress;

        tokio::time::sleep(Duration::from_millis(60)).await;
        let polls = gateway.poll_count();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(gateway.poll_count(), polls);
        assert_eq!(gateway.cancelled_jobs(), vec!["job-1".to_string()]);

        let current = tracker.get(pending.id).unwrap();
        assert_eq!(current.status, ExecutionStatus::Cancelled);
        assert_eq!(current.progress, progress_at_cancel);
        assert_eq!(current.end_time, snapshot.end_time);
        assert!(matches!(tracker.cancel(pending.id), CancelOutcome::AlreadyTerminal(_)));
        assert_eq!(tracker.cancel(Uuid::new_v4()), CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_autostart_runs_base_before_dependent() {
        let mut dashboard = chained_dashboard();
        dashboard.searches.push(
            SearchDefinition::new("manual", "index=audit").with_settings(
                crate::domain::search::SearchSettings {
                    autostart: Some(false),
                    ..Default::default()
                },
            ),
        );
        let gateway = ScriptedGateway::new(vec![JobStatus::new(DispatchState::Done, 1.0)]);
        let (tracker, _) = tracker_with(dashboard, gateway.clone());

        let executions = tracker
            .run_autostart("ops", ExecutionRequest::default())
            .await
            .unwrap();
        let ids: Vec<&str> = executions.iter().map(|e| e.search_id.as_str()).collect();
        assert_eq!(ids, vec!["base", "dependent"]);
        assert!(executions.iter().all(|e| e.status == ExecutionStatus::Completed));

        assert!(tracker.run_autostart("missing", ExecutionRequest::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_waiter_still_reaches_terminal_state() {
        let mut statuses = vec![JobStatus::new(DispatchState::Running, 0.1); 10];
        statuses.push(JobStatus::new(DispatchState::Done, 1.0));
        let gateway = ScriptedGateway::new(statuses);
        let (tracker, _) = tracker_with(chained_dashboard(), gateway.clone());

        let waited = tokio::time::timeout(
            Duration::from_millis(15),
            tracker.run_to_completion(ExecutionRequest::new("ops", "base")),
        )
        .await;
        assert!(waited.is_err());

        let mut execution = tracker.list(Some("ops")).remove(0);
        for _ in 0..100 {
            if execution.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            execution = tracker.get(execution.id).unwrap();
        }
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.end_time.is_some());
        assert!(gateway.poll_count() >= 11);
        assert!(tracker.cancellation(execution.id).is_none());
    }

    /// Counts events seen before a transition (published outside any
    /// transition) and events that appear during one.
    struct WitnessStore {
        inner: InMemoryExecutionStore,
        events: StdMutex<Receiver<EventEnvelope>>,
        inside: StdMutex<usize>,
        stray: StdMutex<usize>,
    }

    impl WitnessStore {
        fn drain(&self) -> usize {
            let mut events = self.events.lock().unwrap();
            let mut drained = 0;
            while events.try_recv().is_ok() {
                drained += 1;
            }
            drained
        }
    }

    impl ExecutionStore for WitnessStore {
        fn insert(&self, execution: Execution) {
            self.inner.insert(execution);
        }

        fn get(&self, id: Uuid) -> Option<Execution> {
            self.inner.get(id)
        }

        fn update(
            &self,
            id: Uuid,
            change: &mut dyn FnMut(&mut Execution) -> bool,
        ) -> Option<Execution> {
            *self.stray.lock().unwrap() += self.drain();
            let snapshot = self.inner.update(id, change);
            *self.inside.lock().unwrap() += self.drain();
            snapshot
        }

        fn list(&self, dashboard_id: Option<&str>) -> Vec<Execution> {
            self.inner.list(dashboard_id)
        }

        fn latest_completed(&self, dashboard_id: &str, search_id: &str) -> Option<Execution> {
            self.inner.latest_completed(dashboard_id, search_id)
        }
    }

    #[tokio::test]
    async fn test_events_are_published_within_their_transition() {
        let publisher = ProgressPublisher::new(1024);
        let store = Arc::new(WitnessStore {
            inner: InMemoryExecutionStore::new(),
            events: StdMutex::new(publisher.subscribe()),
            inside: StdMutex::new(0),
            stray: StdMutex::new(0),
        });
        let tracker = ExecutionTracker::new(
            Arc::new(FileDashboardRepository::from_definitions(vec![chained_dashboard()])),
            Arc::new(ScriptedGateway::new(vec![
                JobStatus::new(DispatchState::Running, 0.5),
                JobStatus::new(DispatchState::Done, 1.0),
            ])),
            store.clone(),
            Arc::new(InMemoryResultSink::new()),
            publisher,
            SearchParameterBuilder::default(),
            TrackerSettings {
                poll_interval: Duration::from_millis(5),
                ..TrackerSettings::default()
            },
        );

        let done = tracker.run_to_completion(ExecutionRequest::new("ops", "base")).await;
        assert_eq!(done.status, ExecutionStatus::Completed);

        let pending = tracker.execute(ExecutionRequest::new("ops", "base"));
        assert!(matches!(tracker.cancel(pending.id), CancelOutcome::Cancelled(_)));
        tokio::time::sleep(Duration::from_millis(20)).await;

        *store.stray.lock().unwrap() += store.drain();
        assert_eq!(*store.stray.lock().unwrap(), 0);
        assert!(*store.inside.lock().unwrap() >= 8);
    }
}
