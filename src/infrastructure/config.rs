// Runner configuration - config/runner.toml overlaid with RUNNER__* environment variables
use crate::application::execution_tracker::TrackerSettings;
use crate::application::parameter_builder::ParameterDefaults;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub engine: EngineSettings,
    pub dashboards: DashboardSettings,
    #[serde(default)]
    pub credentials: Vec<CredentialSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub app: String,
    pub owner: String,
    pub accept_invalid_certs: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    pub poll_interval_ms: u64,
    /// Unset means a remote job is polled until it reaches a terminal state
    pub remote_timeout_secs: Option<u64>,
    pub event_buffer: usize,
    pub results_page_size: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialSettings {
    pub host: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EngineSettings {
    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            remote_timeout: self.remote_timeout_secs.map(Duration::from_secs),
            results_page_size: self.results_page_size.max(1),
        }
    }
}

impl BackendSettings {
    pub fn parameter_defaults(&self) -> ParameterDefaults {
        ParameterDefaults {
            app: self.app.clone(),
            owner: self.owner.clone(),
            ..ParameterDefaults::default()
        }
    }
}

fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("backend.base_url", "https://localhost:8089")?
        .set_default("backend.app", "search")?
        .set_default("backend.owner", "nobody")?
        .set_default("backend.accept_invalid_certs", false)?
        .set_default("backend.request_timeout_secs", 30)?
        .set_default("engine.poll_interval_ms", 2000)?
        .set_default("engine.event_buffer", 1024)?
        .set_default("engine.results_page_size", 50_000)?
        .set_default("dashboards.dir", "dashboards")?)
}

pub fn load_runner_config() -> anyhow::Result<RunnerConfig> {
    let settings = builder()?
        .add_source(config::File::with_name("config/runner").required(false))
        .add_source(config::Environment::with_prefix("RUNNER").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
