// Search definition domain model
use super::refresh::{parse_refresh_interval, RefreshInterval};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub earliest: Option<String>,
    #[serde(default)]
    pub latest: Option<String>,
}

impl TimeRange {
    pub fn new(earliest: impl Into<String>, latest: impl Into<String>) -> Self {
        Self {
            earliest: Some(earliest.into()),
            latest: Some(latest.into()),
        }
    }
}

/// Explicit earliest/latest pair supplied by the caller of an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub earliest: String,
    pub latest: String,
}

impl TimeWindow {
    pub fn new(earliest: impl Into<String>, latest: impl Into<String>) -> Self {
        Self {
            earliest: earliest.into(),
            latest: latest.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Fast,
    #[default]
    Smart,
    Verbose,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Fast => "fast",
            SearchMode::Smart => "smart",
            SearchMode::Verbose => "verbose",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Json,
    Csv,
    Xml,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Json => "json",
            OutputMode::Csv => "csv",
            OutputMode::Xml => "xml",
        }
    }
}

/// Execution settings declared on a search or on the whole dashboard.
/// Unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
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
    #[serde(default)]
    pub dashboard_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDefinition {
    pub id: String,
    pub query: String,
    /// Id of the search whose completed job this one pipes from
    #[serde(default, alias = "ref")]
    pub base: Option<String>,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub settings: SearchSettings,
}

impl SearchDefinition {
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            base: None,
            time_range: TimeRange::default(),
            refresh: None,
            settings: SearchSettings::default(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn refresh_interval(&self) -> Option<RefreshInterval> {
        self.refresh.as_deref().map(parse_refresh_interval)
    }
}
