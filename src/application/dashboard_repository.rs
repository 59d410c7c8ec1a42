// Dashboard repository trait - source of parsed dashboard graphs
use crate::domain::dashboard::DashboardDefinition;
use std::sync::Arc;

pub trait DashboardRepository: Send + Sync {
    fn get(&self, dashboard_id: &str) -> Option<Arc<DashboardDefinition>>;

    fn list(&self) -> Vec<Arc<DashboardDefinition>>;
}
