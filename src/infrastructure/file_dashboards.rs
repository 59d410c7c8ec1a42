// File-backed dashboard repository - one TOML dashboard graph per file
use crate::application::dashboard_repository::DashboardRepository;
use crate::domain::dashboard::DashboardDefinition;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct FileDashboardRepository {
    dashboards: HashMap<String, Arc<DashboardDefinition>>,
}

impl FileDashboardRepository {
    pub fn from_definitions(definitions: Vec<DashboardDefinition>) -> Self {
        let dashboards = definitions
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect();
        Self { dashboards }
    }

    /// Load every `*.toml` in `dir`. A dashboard without an id takes its file stem.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut definitions = Vec::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read dashboard directory {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read dashboard {}", path.display()))?;
            let mut dashboard: DashboardDefinition = toml::from_str(&raw)
                .with_context(|| format!("Failed to parse dashboard {}", path.display()))?;
            if dashboard.id.is_empty() {
                dashboard.id = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
            }
            tracing::debug!(
                "loaded dashboard {} with {} searches",
                dashboard.id,
                dashboard.searches().count()
            );
            definitions.push(dashboard);
        }

        tracing::info!("loaded {} dashboards from {}", definitions.len(), dir.display());
        Ok(Self::from_definitions(definitions))
    }
}

impl DashboardRepository for FileDashboardRepository {
    fn get(&self, dashboard_id: &str) -> Option<Arc<DashboardDefinition>> {
        self.dashboards.get(dashboard_id).cloned()
    }

    fn list(&self) -> Vec<Arc<DashboardDefinition>> {
        let mut dashboards: Vec<_> = self.dashboards.values().cloned().collect();
        dashboards.sort_by(|a, b| a.id.cmp(&b.id));
        dashboards
    }
}
