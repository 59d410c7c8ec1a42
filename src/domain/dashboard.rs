// Dashboard domain model - read-only graph of rows, panels, inputs and searches
use super::search::{SearchDefinition, SearchSettings, TimeRange};
use super::token::TokenDefinition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub search_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub searches: Vec<SearchDefinition>,
    #[serde(default)]
    pub tokens: Vec<TokenDefinition>,
    #[serde(default)]
    pub visualizations: Vec<Visualization>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fieldset {
    #[serde(default)]
    pub submit_button: bool,
    #[serde(default)]
    pub tokens: Vec<TokenDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Dashboard-level time range, used when a search declares none
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub settings: SearchSettings,
    #[serde(default)]
    pub fieldsets: Vec<Fieldset>,
    #[serde(default)]
    pub tokens: Vec<TokenDefinition>,
    #[serde(default)]
    pub searches: Vec<SearchDefinition>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl DashboardDefinition {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: SearchDefinition) -> Self {
        self.searches.push(search);
        self
    }

    pub fn with_token(mut self, token: TokenDefinition) -> Self {
        self.tokens.push(token);
        self
    }

    fn panels(&self) -> impl Iterator<Item = &Panel> {
        self.rows.iter().flat_map(|row| row.panels.iter())
    }

    /// Global searches first, then panel searches in layout order
    pub fn searches(&self) -> impl Iterator<Item = &SearchDefinition> {
        self.searches
            .iter()
            .chain(self.panels().flat_map(|panel| panel.searches.iter()))
    }

    /// Global tokens, then fieldset inputs, then panel inputs
    pub fn tokens(&self) -> impl Iterator<Item = &TokenDefinition> {
        self.tokens
            .iter()
            .chain(self.fieldsets.iter().flat_map(|f| f.tokens.iter()))
            .chain(self.panels().flat_map(|panel| panel.tokens.iter()))
    }

    pub fn find_search(&self, search_id: &str) -> Option<&SearchDefinition> {
        self.searches().find(|s| s.id == search_id)
    }

    pub fn find_token(&self, name: &str) -> Option<&TokenDefinition> {
        self.tokens().find(|t| t.name == name)
    }

    /// Search setting, then dashboard setting, then on
    pub fn autostarts(&self, search: &SearchDefinition) -> bool {
        search
            .settings
            .autostart
            .or(self.settings.autostart)
            .unwrap_or(true)
    }
}
