// Splunk REST gateway - search job dispatch, status polling, results and cancel
use super::config::BackendSettings;
use crate::application::credentials::{BackendAuth, CredentialStore, resolve_auth};
use crate::application::search_gateway::{
    DispatchState, JobHandle, JobStatus, Namespace, SearchGateway,
};
use crate::domain::execution::SearchResults;
use crate::domain::search::TimeRange;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub struct SplunkGateway {
    base_url: String,
    host: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    #[serde(default)]
    entry: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    content: JobContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobContent {
    dispatch_state: String,
    #[serde(default)]
    done_progress: Option<f64>,
    #[serde(default)]
    scan_count: u64,
    #[serde(default)]
    event_count: u64,
    #[serde(default)]
    result_count: u64,
    #[serde(default)]
    is_done: bool,
    #[serde(default)]
    is_failed: bool,
    #[serde(default)]
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldEntry {
    Named { name: String },
    Plain(String),
}

impl FieldEntry {
    fn into_name(self) -> String {
        match self {
            FieldEntry::Named { name } => name,
            FieldEntry::Plain(name) => name,
        }
    }
}

impl SplunkGateway {
    pub fn new(settings: &BackendSettings, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let host = reqwest::Url::parse(&base_url)
            .with_context(|| format!("Invalid backend base_url '{}'", base_url))?
            .host_str()
            .map(str::to_string)
            .with_context(|| format!("Backend base_url '{}' has no host", base_url))?;

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            host,
            client,
            credentials,
        })
    }

    fn jobs_url(&self, namespace: &Namespace) -> String {
        format!(
            "{}/servicesNS/{}/{}/search/jobs",
            self.base_url,
            urlencoding::encode(&namespace.owner),
            urlencoding::encode(&namespace.app)
        )
    }

    fn job_url(&self, job: &JobHandle) -> String {
        format!(
            "{}/services/search/jobs/{}",
            self.base_url,
            urlencoding::encode(&job.sid)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(match resolve_auth(self.credentials.as_ref(), &self.host)? {
            BackendAuth::Bearer(token) => request.bearer_auth(token),
            BackendAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<T> {
        let response = self
            .authorize(request)?
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to Splunk", action))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Splunk {} failed with status {}: {}",
                action,
                status,
                error_text(&body)
            );
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse Splunk {} response", action))
    }
}

/// Dispatch needs an explicit `search` command unless the query starts with a generating pipe
pub fn normalize_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.starts_with('|') || trimmed.to_ascii_lowercase().starts_with("search ") {
        trimmed.to_string()
    } else {
        format!("search {}", trimmed)
    }
}

/// Dispatch form fields; the JSON response format is fixed by this gateway
pub fn dispatch_form(
    query: &str,
    time_range: &TimeRange,
    extra_params: &[(String, String)],
) -> Vec<(String, String)> {
    let mut form = vec![("search".to_string(), normalize_query(query))];
    if let Some(earliest) = &time_range.earliest {
        form.push(("earliest_time".to_string(), earliest.clone()));
    }
    if let Some(latest) = &time_range.latest {
        form.push(("latest_time".to_string(), latest.clone()));
    }
    form.extend(extra_params.iter().cloned());
    form.push(("output_mode".to_string(), "json".to_string()));
    form.push(("exec_mode".to_string(), "normal".to_string()));
    form
}

fn message_texts(messages: &[Value]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            Value::String(text) => Some(text.clone()),
            Value::Object(fields) => fields
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Error bodies carry `messages[].text`; fall back to the raw body otherwise
fn error_text(body: &str) -> String {
    let texts = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("messages").and_then(Value::as_array).map(|m| message_texts(m)))
        .unwrap_or_default();
    if texts.is_empty() {
        body.to_string()
    } else {
        texts.join("; ")
    }
}

fn into_search_results(mut payload: serde_json::Map<String, Value>) -> Result<SearchResults> {
    let rows: Vec<BTreeMap<String, Value>> = match payload.remove("results") {
        Some(results) => serde_json::from_value(results).context("Malformed Splunk results")?,
        None => Vec::new(),
    };
    let fields: Vec<FieldEntry> = match payload.remove("fields") {
        Some(fields) => serde_json::from_value(fields).context("Malformed Splunk fields")?,
        None => Vec::new(),
    };
    Ok(SearchResults::new(
        rows,
        fields.into_iter().map(FieldEntry::into_name).collect(),
        payload,
    ))
}

#[async_trait]
impl SearchGateway for SplunkGateway {
    async fn submit(
        &self,
        query: &str,
        time_range: &TimeRange,
        namespace: &Namespace,
        extra_params: &[(String, String)],
    ) -> Result<JobHandle> {
        let form = dispatch_form(query, time_range, extra_params);
        tracing::debug!("dispatching search in {}/{}: {}", namespace.owner, namespace.app, query);
        let request = self
            .client
            .post(self.jobs_url(namespace))
            .form(&form);

        let response: SubmitResponse = self.send(request, "job dispatch").await?;
        Ok(JobHandle::new(response.sid))
    }

    async fn poll_status(&self, job: &JobHandle) -> Result<JobStatus> {
        let request = self
            .client
            .get(self.job_url(job))
            .query(&[("output_mode", "json")]);
        let envelope: JobEnvelope = self.send(request, "job status").await?;

        let content = envelope
            .entry
            .into_iter()
            .next()
            .map(|e| e.content)
            .with_context(|| format!("Splunk returned no entry for job {}", job.sid))?;

        Ok(JobStatus {
            dispatch_state: DispatchState::parse(&content.dispatch_state),
            done_fraction: content.done_progress.unwrap_or(0.0),
            scan_count: content.scan_count,
            event_count: content.event_count,
            result_count: content.result_count,
            is_done: content.is_done,
            is_failed: content.is_failed,
            messages: message_texts(&content.messages),
        })
    }

    async fn fetch_results(&self, job: &JobHandle, offset: u64, count: u64) -> Result<SearchResults> {
        let request = self
            .client
            .get(format!("{}/results", self.job_url(job)))
            .query(&[
                ("output_mode", "json".to_string()),
                ("offset", offset.to_string()),
                ("count", count.to_string()),
            ]);
        let payload: serde_json::Map<String, Value> = self.send(request, "results fetch").await?;
        into_search_results(payload)
    }

    async fn cancel(&self, job: &JobHandle) -> Result<()> {
        let request = self
            .client
            .post(format!("{}/control", self.job_url(job)))
            .form(&[("action", "cancel"), ("output_mode", "json")]);
        let _: Value = self.send(request, "job cancel").await?;
        tracing::info!("cancelled Splunk job {}", job.sid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credential_store::ConfigCredentialStore;
    use serde_json::json;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("index=main"), "search index=main");
        assert_eq!(normalize_query("  | makeresults"), "| makeresults");
        assert_eq!(normalize_query("Search index=web"), "Search index=web");
    }

    #[test]
    fn test_dispatch_form() {
        let extra = vec![("max_count".to_string(), "100".to_string())];
        let form = dispatch_form("index=main", &TimeRange::new("-24h@h", "now"), &extra);
        let keys: Vec<&str> = form.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["search", "earliest_time", "latest_time", "max_count", "output_mode", "exec_mode"]
        );
        assert_eq!(form[0].1, "search index=main");

        let chained = dispatch_form("| loadjob sid | stats count", &TimeRange::default(), &[]);
        assert!(chained.iter().all(|(k, _)| k != "earliest_time" && k != "latest_time"));
    }

    #[test]
    fn test_dispatch_request_is_form_encoded() {
        let form = dispatch_form("index=main", &TimeRange::default(), &[]);
        let request = reqwest::Client::new()
            .post("https://splunk.internal:8089/services/search/jobs")
            .form(&form)
            .build()
            .unwrap();
        assert_eq!(
            request.headers()[reqwest::header::CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        let body = std::str::from_utf8(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert!(body.starts_with("search=search+index%3Dmain&"));
    }

    #[test]
    fn test_job_content_parse() {
        let envelope: JobEnvelope = serde_json::from_value(json!({
            "entry": [{
                "content": {
                    "dispatchState": "FAILED",
                    "doneProgress": 0.4,
                    "isFailed": true,
                    "messages": [{"type": "FATAL", "text": "Unknown search command 'foo'."}]
                }
            }]
        }))
        .unwrap();
        let content = &envelope.entry[0].content;
        assert_eq!(DispatchState::parse(&content.dispatch_state), DispatchState::Failed);
        assert_eq!(
            message_texts(&content.messages),
            vec!["Unknown search command 'foo'.".to_string()]
        );
    }

    #[test]
    fn test_results_split_rows_fields_and_metadata() {
        let payload = json!({
            "preview": false,
            "fields": [{"name": "host"}, "count"],
            "results": [{"host": "web-1", "count": "4"}]
        });
        let results = into_search_results(payload.as_object().unwrap().clone()).unwrap();
        assert_eq!(results.fields, vec!["host", "count"]);
        assert_eq!(results.rows.len(), 1);
        assert_eq!(results.metadata.get("preview"), Some(&json!(false)));
    }

    #[test]
    fn test_error_text_prefers_messages() {
        let body = r#"{"messages":[{"type":"ERROR","text":"bad earliest_time"}]}"#;
        assert_eq!(error_text(body), "bad earliest_time");
        assert_eq!(error_text("gateway down"), "gateway down");
    }

    #[test]
    fn test_gateway_host_from_base_url() {
        let settings = BackendSettings {
            base_url: "https://splunk.internal:8089/".to_string(),
            app: "search".to_string(),
            owner: "nobody".to_string(),
            accept_invalid_certs: true,
            request_timeout_secs: 5,
        };
        let gateway =
            SplunkGateway::new(&settings, Arc::new(ConfigCredentialStore::default())).unwrap();
        assert_eq!(gateway.host, "splunk.internal");
        let namespace = Namespace {
            app: "search".to_string(),
            owner: "nobody".to_string(),
        };
        assert_eq!(
            gateway.jobs_url(&namespace),
            "https://splunk.internal:8089/servicesNS/nobody/search/search/jobs"
        );
    }
}
