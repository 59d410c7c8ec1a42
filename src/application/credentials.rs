// Backend credential lookup - stored token first, then username/password
use anyhow::bail;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendAuth {
    Bearer(String),
    Basic { username: String, password: String },
}

pub trait CredentialStore: Send + Sync {
    fn lookup(&self, host: &str) -> anyhow::Result<Option<StoredCredentials>>;
}

pub fn resolve_auth(store: &dyn CredentialStore, host: &str) -> anyhow::Result<BackendAuth> {
    let stored = store.lookup(host)?.unwrap_or_default();

    if let Some(token) = stored.token.filter(|t| !t.is_empty()) {
        return Ok(BackendAuth::Bearer(token));
    }
    if let (Some(username), Some(password)) = (stored.username, stored.password) {
        return Ok(BackendAuth::Basic { username, password });
    }

    bail!(
        "no credentials registered for host '{}'; add a [[credentials]] entry with host = \"{}\" and either a token or a username and password",
        host,
        host
    )
}
