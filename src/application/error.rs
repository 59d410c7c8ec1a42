// Error taxonomy for search executions
use std::fmt;
use std::time::Duration;

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedToken {
    pub name: String,
    pub reason: String,
}

impl UnresolvedToken {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for UnresolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}$ ({})", self.name, self.reason)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("search query is empty")]
    EmptyQuery,
    #[error("undefined token(s): {}", join(.0))]
    UndefinedToken(Vec<String>),
    #[error("search '{search_id}' references unknown search '{reference}'")]
    InvalidSearchReference { search_id: String, reference: String },
    #[error("dashboard '{0}' not found")]
    DashboardNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterBuildFailure {
    #[error("token resolution incomplete: {}", join(.0))]
    IncompleteResolution(Vec<String>),
    #[error("dashboard '{0}' not found")]
    DashboardNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("search '{search_id}' not found in dashboard '{dashboard_id}'")]
    SearchNotFound {
        dashboard_id: String,
        search_id: String,
    },
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationFailure),
    #[error("cannot resolve token(s): {}", join(.unresolved))]
    TokenResolutionFailed { unresolved: Vec<UnresolvedToken> },
    #[error("parameter build failed: {0}")]
    ParameterBuildFailed(#[from] ParameterBuildFailure),
    #[error("base search '{base_search_id}' not yet executed")]
    BaseSearchUnresolved { base_search_id: String },
    #[error("remote search failed: {}", .messages.join("; "))]
    RemoteFailed { messages: Vec<String> },
    #[error("remote search did not finish within {0:?}")]
    RemoteTimeout(Duration),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl SearchError {
    pub fn remote(err: anyhow::Error) -> Self {
        SearchError::RemoteFailed {
            messages: vec![format!("{:#}", err)],
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SearchError::SearchNotFound { .. }
                | SearchError::ValidationFailed(ValidationFailure::DashboardNotFound(_))
        )
    }
}
