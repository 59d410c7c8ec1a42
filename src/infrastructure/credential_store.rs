// Credential store backed by the [[credentials]] configuration list
use super::config::CredentialSettings;
use crate::application::credentials::{CredentialStore, StoredCredentials};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ConfigCredentialStore {
    entries: HashMap<String, StoredCredentials>,
}

impl ConfigCredentialStore {
    pub fn new(credentials: &[CredentialSettings]) -> Self {
        let entries = credentials
            .iter()
            .map(|c| {
                (
                    c.host.to_ascii_lowercase(),
                    StoredCredentials {
                        token: c.token.clone(),
                        username: c.username.clone(),
                        password: c.password.clone(),
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl CredentialStore for ConfigCredentialStore {
    fn lookup(&self, host: &str) -> anyhow::Result<Option<StoredCredentials>> {
        Ok(self.entries.get(&host.to_ascii_lowercase()).cloned())
    }
}
