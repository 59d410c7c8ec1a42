// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use axum::{
    Router,
    routing::{get, post},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_repository::DashboardRepository;
use crate::application::execution_store::{ExecutionStore, ResultSink};
use crate::application::execution_tracker::ExecutionTracker;
use crate::application::parameter_builder::SearchParameterBuilder;
use crate::application::progress_publisher::ProgressPublisher;
use crate::application::search_gateway::SearchGateway;
use crate::infrastructure::config::load_runner_config;
use crate::infrastructure::credential_store::ConfigCredentialStore;
use crate::infrastructure::file_dashboards::FileDashboardRepository;
use crate::infrastructure::memory_store::{InMemoryExecutionStore, InMemoryResultSink};
use crate::infrastructure::splunk_gateway::SplunkGateway;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    cancel_execution, execution_results, get_execution, health_check, list_dashboards,
    list_executions, run_autostart, start_execution, stream_events,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_runner_config()?;

    // Create adapters (infrastructure layer)
    let credentials = Arc::new(ConfigCredentialStore::new(&config.credentials));
    let gateway: Arc<dyn SearchGateway> =
        Arc::new(SplunkGateway::new(&config.backend, credentials)?);
    let dashboards: Arc<dyn DashboardRepository> =
        Arc::new(FileDashboardRepository::load(&config.dashboards.dir)?);
    let store: Arc<dyn ExecutionStore> = Arc::new(InMemoryExecutionStore::new());
    let results: Arc<dyn ResultSink> = Arc::new(InMemoryResultSink::new());

    // Create tracker (application layer)
    let tracker = ExecutionTracker::new(
        dashboards.clone(),
        gateway,
        store,
        results.clone(),
        ProgressPublisher::new(config.engine.event_buffer),
        SearchParameterBuilder::new(config.backend.parameter_defaults()),
        config.engine.tracker_settings(),
    );

    let state = Arc::new(AppState {
        tracker,
        dashboards,
        results,
    });

    // Build router (presentation layer)
    // Compression is applied per response and per event frame, not as a layer.
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboards", get(list_dashboards))
        .route(
            "/dashboards/:id/searches/:search_id/executions",
            post(start_execution),
        )
        .route("/dashboards/:id/autostart", post(run_autostart))
        .route("/executions", get(list_executions))
        .route(
            "/executions/:id",
            get(get_execution).delete(cancel_execution),
        )
        .route("/executions/:id/results", get(execution_results))
        .route("/executions/:id/events", get(stream_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting dashboard-runner on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
