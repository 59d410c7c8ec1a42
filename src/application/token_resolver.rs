// Token resolver - layered value resolution for dashboard placeholders
use crate::application::error::UnresolvedToken;
use crate::application::token_extractor::{extract_token_names, substitute_tokens};
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::search::{SearchDefinition, TimeRange, TimeWindow};
use crate::domain::token::{TokenDefinition, TokenType};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

const WILDCARD: &str = "*";
const ROLLING_EARLIEST: &str = "-24h";
const ROLLING_LATEST: &str = "now";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    CallerValue,
    TimeWindow,
    DeclaredDefault,
    Choice,
    TypeFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResolution {
    pub name: String,
    pub value: String,
    pub source: ResolutionSource,
    /// Advisory note for values that were not chosen by the caller or the dashboard author
    pub note: Option<String>,
}

impl TokenResolution {
    fn new(name: &str, value: impl Into<String>, source: ResolutionSource) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            source,
            note: None,
        }
    }

    fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TimeBound {
    Earliest,
    Latest,
}

fn time_bound(name: &str) -> Option<TimeBound> {
    if name == "earliest" || name.ends_with(".earliest") {
        Some(TimeBound::Earliest)
    } else if name == "latest" || name.ends_with(".latest") {
        Some(TimeBound::Latest)
    } else {
        None
    }
}

/// `window.earliest` -> `window`
fn token_stem(name: &str) -> Option<&str> {
    name.strip_suffix(".earliest")
        .or_else(|| name.strip_suffix(".latest"))
}

/// True when `name` is an earliest/latest reference that a supplied window satisfies
pub fn is_time_window_reference(name: &str, window: Option<&TimeWindow>) -> bool {
    window.is_some() && time_bound(name).is_some()
}

/// Definition for `name`, looking through `.earliest`/`.latest` suffixes
pub fn lookup_definition<'a>(
    dashboard: &'a DashboardDefinition,
    name: &str,
) -> Option<&'a TokenDefinition> {
    dashboard
        .find_token(name)
        .or_else(|| token_stem(name).and_then(|stem| dashboard.find_token(stem)))
}

/// Resolve one placeholder. First match wins: caller value, explicit time
/// window, declared default, choice list, then the type fallback.
pub fn resolve_token(
    name: &str,
    definition: Option<&TokenDefinition>,
    caller_values: &HashMap<String, String>,
    time_window: Option<&TimeWindow>,
) -> Result<TokenResolution, UnresolvedToken> {
    if let Some(value) = caller_values.get(name) {
        return Ok(TokenResolution::new(name, value, ResolutionSource::CallerValue));
    }

    let bound = time_bound(name);
    if let (Some(bound), Some(window)) = (bound, time_window) {
        let value = match bound {
            TimeBound::Earliest => &window.earliest,
            TimeBound::Latest => &window.latest,
        };
        return Ok(TokenResolution::new(name, value, ResolutionSource::TimeWindow));
    }

    let Some(definition) = definition else {
        return Err(UnresolvedToken::new(
            name,
            "no definition, caller value or time window",
        ));
    };

    let declared = match (bound, &definition.default_range) {
        (Some(TimeBound::Earliest), Some(range)) => range.earliest.as_ref(),
        (Some(TimeBound::Latest), Some(range)) => range.latest.as_ref(),
        _ => definition.default.as_ref(),
    };
    if let Some(value) = declared {
        return Ok(TokenResolution::new(name, value, ResolutionSource::DeclaredDefault));
    }

    if definition.kind.supports_choices() {
        if let Some(choice) = definition.default_choice() {
            return Ok(
                TokenResolution::new(name, &choice.value, ResolutionSource::Choice)
                    .with_note("used default choice"),
            );
        }
        if let Some(choice) = definition.choices.first() {
            return Ok(
                TokenResolution::new(name, &choice.value, ResolutionSource::Choice)
                    .with_note("used first choice"),
            );
        }
    }

    match definition.kind {
        TokenType::Text | TokenType::Dropdown | TokenType::Multiselect => Ok(
            TokenResolution::new(name, WILDCARD, ResolutionSource::TypeFallback)
                .with_note("used wildcard default"),
        ),
        TokenType::Time => {
            let value = match bound {
                Some(TimeBound::Latest) => ROLLING_LATEST,
                _ => ROLLING_EARLIEST,
            };
            Ok(
                TokenResolution::new(name, value, ResolutionSource::TypeFallback)
                    .with_note("used rolling 24h window"),
            )
        }
        TokenType::Radio | TokenType::Checkbox => Ok(
            TokenResolution::new(name, "true", ResolutionSource::TypeFallback)
                .with_note("used boolean default"),
        ),
        TokenType::Link => Err(UnresolvedToken::new(
            name,
            "link input has no default and no choices",
        )),
    }
}

/// Outcome of resolving every placeholder of one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResolution {
    pub search_id: String,
    /// Query text with every resolved placeholder substituted
    pub query: String,
    pub time_range: TimeRange,
    pub resolved: Vec<TokenResolution>,
    pub unresolved: Vec<UnresolvedToken>,
}

impl SearchResolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn notes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.resolved
            .iter()
            .filter_map(|r| r.note.as_deref().map(|note| (r.name.as_str(), note)))
    }
}

pub struct TokenResolver<'a> {
    dashboard: &'a DashboardDefinition,
    caller_values: &'a HashMap<String, String>,
    time_window: Option<&'a TimeWindow>,
}

impl<'a> TokenResolver<'a> {
    pub fn new(
        dashboard: &'a DashboardDefinition,
        caller_values: &'a HashMap<String, String>,
        time_window: Option<&'a TimeWindow>,
    ) -> Self {
        Self {
            dashboard,
            caller_values,
            time_window,
        }
    }

    pub fn resolve(&self, name: &str) -> Result<TokenResolution, UnresolvedToken> {
        resolve_token(
            name,
            lookup_definition(self.dashboard, name),
            self.caller_values,
            self.time_window,
        )
    }

    /// Resolve the placeholders of a search's query and time range, then substitute them
    pub fn resolve_search(&self, search: &SearchDefinition) -> SearchResolution {
        let mut names: BTreeSet<String> = extract_token_names(&search.query);
        for bound in [&search.time_range.earliest, &search.time_range.latest]
            .into_iter()
            .flatten()
        {
            names.extend(extract_token_names(bound));
        }

        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for name in &names {
            match self.resolve(name) {
                Ok(resolution) => {
                    if let Some(note) = &resolution.note {
                        tracing::warn!(
                            "token ${}$ in search {} {}: {}",
                            name,
                            search.id,
                            note,
                            resolution.value
                        );
                    }
                    resolved.push(resolution);
                }
                Err(missing) => unresolved.push(missing),
            }
        }

        let values: HashMap<String, String> = resolved
            .iter()
            .map(|r| (r.name.clone(), r.value.clone()))
            .collect();
        let time_range = TimeRange {
            earliest: search
                .time_range
                .earliest
                .as_deref()
                .map(|t| substitute_tokens(t, &values)),
            latest: search
                .time_range
                .latest
                .as_deref()
                .map(|t| substitute_tokens(t, &values)),
        };

        SearchResolution {
            search_id: search.id.clone(),
            query: substitute_tokens(&search.query, &values),
            time_range,
            resolved,
            unresolved,
        }
    }
}
