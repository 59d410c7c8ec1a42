// Search discovery and validation
use crate::application::error::{SearchError, ValidationFailure};
use crate::application::token_extractor::extract_token_names;
use crate::application::token_resolver::{is_time_window_reference, lookup_definition};
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::search::{SearchDefinition, TimeWindow};
use std::collections::HashMap;

/// A search validated against the dashboard that declares it
#[derive(Debug, Clone, Copy)]
pub struct Discovered<'a> {
    pub dashboard: &'a DashboardDefinition,
    pub search: &'a SearchDefinition,
}

/// Locate `search_id` in the dashboard and check it can be executed
pub fn discover_search<'a>(
    dashboard_id: &str,
    dashboard: Option<&'a DashboardDefinition>,
    search_id: &str,
    caller_values: &HashMap<String, String>,
    time_window: Option<&TimeWindow>,
) -> Result<Discovered<'a>, SearchError> {
    let dashboard = dashboard
        .ok_or_else(|| ValidationFailure::DashboardNotFound(dashboard_id.to_string()))?;
    let search = dashboard
        .find_search(search_id)
        .ok_or_else(|| SearchError::SearchNotFound {
            dashboard_id: dashboard_id.to_string(),
            search_id: search_id.to_string(),
        })?;

    if search.query.trim().is_empty() {
        return Err(ValidationFailure::EmptyQuery.into());
    }

    if let Some(base) = &search.base {
        if base == &search.id || dashboard.find_search(base).is_none() {
            return Err(ValidationFailure::InvalidSearchReference {
                search_id: search.id.clone(),
                reference: base.clone(),
            }
            .into());
        }
    }

    let mut referenced = extract_token_names(&search.query);
    for bound in [&search.time_range.earliest, &search.time_range.latest]
        .into_iter()
        .flatten()
    {
        referenced.extend(extract_token_names(bound));
    }
    let undefined: Vec<String> = referenced
        .into_iter()
        .filter(|name| {
            !caller_values.contains_key(name)
                && !is_time_window_reference(name, time_window)
                && lookup_definition(dashboard, name).is_none()
        })
        .collect();
    if !undefined.is_empty() {
        return Err(ValidationFailure::UndefinedToken(undefined).into());
    }

    tracing::debug!("discovered search {} in dashboard {}", search_id, dashboard_id);
    Ok(Discovered { dashboard, search })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::{TokenDefinition, TokenType};

    fn dashboard() -> DashboardDefinition {
        DashboardDefinition::new("ops", "Operations")
            .with_token(TokenDefinition::new("env", TokenType::Text))
            .with_search(SearchDefinition::new("base", "index=main env=$env$"))
            .with_search(SearchDefinition::new("dependent", "| stats count").with_base("base"))
            .with_search(SearchDefinition::new("blank", "   "))
            .with_search(SearchDefinition::new("orphan", "| head 1").with_base("nowhere"))
            .with_search(SearchDefinition::new("self", "| head 1").with_base("self"))
            .with_search(SearchDefinition::new("ghost", "host=$host$ $range.earliest$"))
    }

    fn discover(
        dashboard: Option<&DashboardDefinition>,
        search_id: &str,
        values: &HashMap<String, String>,
        window: Option<&TimeWindow>,
    ) -> Result<String, SearchError> {
        discover_search("ops", dashboard, search_id, values, window).map(|d| d.search.id.clone())
    }

    #[test]
    fn test_discovers_valid_searches() {
        let dashboard = dashboard();
        let values = HashMap::new();
        assert_eq!(discover(Some(&dashboard), "base", &values, None).unwrap(), "base");
        assert_eq!(
            discover(Some(&dashboard), "dependent", &values, None).unwrap(),
            "dependent"
        );
    }

    #[test]
    fn test_missing_dashboard_and_search() {
        let values = HashMap::new();
        assert_eq!(
            discover(None, "base", &values, None),
            Err(ValidationFailure::DashboardNotFound("ops".to_string()).into())
        );
        assert!(matches!(
            discover(Some(&dashboard()), "nope", &values, None),
            Err(SearchError::SearchNotFound { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_query_and_bad_references() {
        let dashboard = dashboard();
        let values = HashMap::new();
        assert_eq!(
            discover(Some(&dashboard), "blank", &values, None),
            Err(ValidationFailure::EmptyQuery.into())
        );
        assert!(matches!(
            discover(Some(&dashboard), "orphan", &values, None),
            Err(SearchError::ValidationFailed(ValidationFailure::InvalidSearchReference { .. }))
        ));
        assert!(matches!(
            discover(Some(&dashboard), "self", &values, None),
            Err(SearchError::ValidationFailed(ValidationFailure::InvalidSearchReference { .. }))
        ));
    }

    #[test]
    fn test_undefined_tokens() {
        let dashboard = dashboard();
        let mut values = HashMap::new();
        assert_eq!(
            discover(Some(&dashboard), "ghost", &values, None),
            Err(ValidationFailure::UndefinedToken(vec![
                "host".to_string(),
                "range.earliest".to_string()
            ])
            .into())
        );

        values.insert("host".to_string(), "web01".to_string());
        let window = TimeWindow::new("-1h", "now");
        assert!(discover(Some(&dashboard), "ghost", &values, Some(&window)).is_ok());
    }
}
