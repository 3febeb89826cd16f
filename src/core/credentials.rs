//! Provider credential lookup: environment first, then the keyring.
//! Keyring outages degrade to "no credential" so turns fall back offline.

use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::keyring::{KeyringAccessError, SecretStore};
use crate::utils::url::provider_host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment(String),
    Keyring(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub secret: String,
    pub source: CredentialSource,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Keyring account for the configured provider.
pub fn keyring_account(config: &Config) -> String {
    provider_host(config.base_url())
}

pub fn resolve_credential<E>(config: &Config, env: E, keyring: &dyn SecretStore) -> Option<Credential>
where
    E: Fn(&str) -> Option<String>,
{
    let variable = config.api_key_env();
    if let Some(secret) = env(variable).filter(|value| !value.trim().is_empty()) {
        debug!(variable, "using provider key from environment");
        return Some(Credential {
            secret: secret.trim().to_string(),
            source: CredentialSource::Environment(variable.to_string()),
        });
    }

    let account = keyring_account(config);
    match keyring.get(&account) {
        Ok(Some(secret)) if !secret.trim().is_empty() => {
            debug!(account = %account, "using provider key from keyring");
            Some(Credential {
                secret: secret.trim().to_string(),
                source: CredentialSource::Keyring(account),
            })
        }
        Ok(_) => None,
        Err(err) => {
            log_keyring_error(&account, &err);
            None
        }
    }
}

/// Environment plus system keyring.
pub fn resolve_from_system(config: &Config) -> Option<Credential> {
    resolve_credential(
        config,
        |name| std::env::var(name).ok(),
        &crate::core::keyring::SystemKeyring,
    )
}

fn log_keyring_error(account: &str, err: &KeyringAccessError) {
    if err.is_recoverable() {
        warn!(account, error = %err, "keyring unavailable; continuing without stored key");
    } else {
        warn!(account, error = %err, "keyring lookup failed");
    }
}
