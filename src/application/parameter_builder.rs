// Search parameter builder - merges resolved tokens, time range and overrides
use crate::application::error::ParameterBuildFailure;
use crate::application::token_resolver::SearchResolution;
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::search::{OutputMode, SearchDefinition, SearchMode, TimeWindow};
use serde::{Deserialize, Serialize};

/// Backend cap on returned rows; larger requests are clamped
pub const MAX_RESULT_COUNT: u64 = 50_000;

/// Caller overrides; any subset may be set and each wins over the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParameterOverrides {
    #[serde(default)]
    pub earliest: Option<String>,
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub search_mode: Option<SearchMode>,
    #[serde(default)]
    pub autostart: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub output_mode: Option<OutputMode>,
    #[serde(default)]
    pub max_count: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Hard defaults, the last layer of precedence
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefaults {
    pub earliest: String,
    pub latest: String,
    pub search_mode: SearchMode,
    pub autostart: bool,
    pub timeout_secs: u64,
    pub output_mode: OutputMode,
    pub max_count: u64,
    pub app: String,
    pub owner: String,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            earliest: "-24h@h".to_string(),
            latest: "now".to_string(),
            search_mode: SearchMode::Smart,
            autostart: true,
            timeout_secs: 600,
            output_mode: OutputMode::Json,
            max_count: 10_000,
            app: "search".to_string(),
            owner: "nobody".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionContext {
    pub app: String,
    pub owner: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedParameters {
    pub query: String,
    /// Cleared for chained searches, which inherit the base job's window
    pub earliest: Option<String>,
    pub latest: Option<String>,
    pub search_mode: SearchMode,
    pub autostart: bool,
    pub output_mode: OutputMode,
    pub max_count: u64,
    pub offset: u64,
    pub context: ExecutionContext,
    pub dashboard_title: String,
    /// Non-fatal adjustments made while building
    pub issues: Vec<String>,
}

pub struct ParameterInputs<'a> {
    pub dashboard_id: &'a str,
    pub dashboard: Option<&'a DashboardDefinition>,
    pub search: &'a SearchDefinition,
    pub resolution: &'a SearchResolution,
    pub time_window: Option<&'a TimeWindow>,
    pub overrides: &'a SearchParameterOverrides,
}

#[derive(Debug, Clone, Default)]
pub struct SearchParameterBuilder {
    defaults: ParameterDefaults,
}

// First set value wins: override, then per-search, then dashboard, then default.
fn pick<T: Clone>(layers: [Option<&T>; 3], default: &T) -> T {
    layers
        .into_iter()
        .flatten()
        .next()
        .unwrap_or(default)
        .clone()
}

impl SearchParameterBuilder {
    pub fn new(defaults: ParameterDefaults) -> Self {
        Self { defaults }
    }

    pub fn build(
        &self,
        inputs: ParameterInputs<'_>,
    ) -> Result<ResolvedParameters, ParameterBuildFailure> {
        let ParameterInputs {
            dashboard_id,
            dashboard,
            search,
            resolution,
            time_window,
            overrides,
        } = inputs;

        if !resolution.is_complete() {
            return Err(ParameterBuildFailure::IncompleteResolution(
                resolution.unresolved.iter().map(|u| u.name.clone()).collect(),
            ));
        }
        let dashboard = dashboard
            .ok_or_else(|| ParameterBuildFailure::DashboardNotFound(dashboard_id.to_string()))?;

        let search_settings = &search.settings;
        let dashboard_settings = &dashboard.settings;
        let defaults = &self.defaults;

        // A request window sits between explicit overrides and the search's own range.
        let earliest = overrides
            .earliest
            .as_ref()
            .or(time_window.map(|w| &w.earliest))
            .or(resolution.time_range.earliest.as_ref())
            .or(dashboard.time_range.earliest.as_ref())
            .unwrap_or(&defaults.earliest)
            .clone();
        let latest = overrides
            .latest
            .as_ref()
            .or(time_window.map(|w| &w.latest))
            .or(resolution.time_range.latest.as_ref())
            .or(dashboard.time_range.latest.as_ref())
            .unwrap_or(&defaults.latest)
            .clone();

        let mut issues = Vec::new();
        let requested_max = pick(
            [
                overrides.max_count.as_ref(),
                search_settings.max_count.as_ref(),
                dashboard_settings.max_count.as_ref(),
            ],
            &defaults.max_count,
        );
        let max_count = if requested_max > MAX_RESULT_COUNT {
            let issue = format!(
                "max count {} exceeds limit {}; clamped",
                requested_max, MAX_RESULT_COUNT
            );
            tracing::warn!("search {}: {}", search.id, issue);
            issues.push(issue);
            MAX_RESULT_COUNT
        } else {
            requested_max
        };

        let dashboard_title = search_settings
            .dashboard_title
            .as_ref()
            .or(dashboard_settings.dashboard_title.as_ref())
            .cloned()
            .unwrap_or_else(|| dashboard.title.clone());

        Ok(ResolvedParameters {
            query: resolution.query.clone(),
            earliest: Some(earliest),
            latest: Some(latest),
            search_mode: pick(
                [
                    overrides.search_mode.as_ref(),
                    search_settings.search_mode.as_ref(),
                    dashboard_settings.search_mode.as_ref(),
                ],
                &defaults.search_mode,
            ),
            autostart: pick(
                [
                    overrides.autostart.as_ref(),
                    search_settings.autostart.as_ref(),
                    dashboard_settings.autostart.as_ref(),
                ],
                &defaults.autostart,
            ),
            output_mode: pick(
                [
                    overrides.output_mode.as_ref(),
                    search_settings.output_mode.as_ref(),
                    dashboard_settings.output_mode.as_ref(),
                ],
                &defaults.output_mode,
            ),
            max_count,
            offset: pick(
                [
                    overrides.offset.as_ref(),
                    search_settings.offset.as_ref(),
                    dashboard_settings.offset.as_ref(),
                ],
                &0,
            ),
            context: ExecutionContext {
                app: pick(
                    [
                        overrides.app.as_ref(),
                        search_settings.app.as_ref(),
                        dashboard_settings.app.as_ref(),
                    ],
                    &defaults.app,
                ),
                owner: pick(
                    [
                        overrides.owner.as_ref(),
                        search_settings.owner.as_ref(),
                        dashboard_settings.owner.as_ref(),
                    ],
                    &defaults.owner,
                ),
                // Not clamped, unlike max count
                timeout_secs: pick(
                    [
                        overrides.timeout_secs.as_ref(),
                        search_settings.timeout_secs.as_ref(),
                        dashboard_settings.timeout_secs.as_ref(),
                    ],
                    &defaults.timeout_secs,
                ),
            },
            dashboard_title,
            issues,
        })
    }
}
