// Application state for HTTP handlers
use crate::application::dashboard_repository::DashboardRepository;
use crate::application::execution_store::ResultSink;
use crate::application::execution_tracker::ExecutionTracker;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub tracker: ExecutionTracker,
    pub dashboards: Arc<dyn DashboardRepository>,
    pub results: Arc<dyn ResultSink>,
}
