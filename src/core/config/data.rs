use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::models::ModelEntry;

/// Which transport answers completion requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions API called directly with a key.
    #[default]
    Native,
    /// A relay endpoint that holds the key server-side.
    Http,
    /// No network at all; every reply comes from the offline responder.
    Simulated,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Http => "http",
            BackendKind::Simulated => "simulated",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(BackendKind::Native),
            "http" | "relay" => Ok(BackendKind::Http),
            "simulated" | "offline" => Ok(BackendKind::Simulated),
            other => Err(format!(
                "unknown backend '{other}' (expected native, http, or simulated)"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Completion transport (native, http, simulated)
    pub backend: Option<BackendKind>,
    /// Base URL of the OpenAI-compatible API used by the native backend
    pub base_url: Option<String>,
    /// Relay endpoint used by the http backend (e.g. "http://localhost:5000/chat")
    pub relay_url: Option<String>,
    /// Environment variable holding the provider key
    pub api_key_env: Option<String>,
    /// Upper bound for one completion request, in seconds
    pub timeout_secs: Option<u64>,
    /// Location of the conversation store
    pub store_path: Option<PathBuf>,
    /// Model selected for new conversations (display name or provider id)
    pub default_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Sent upstream as `X-Title`
    pub app_title: Option<String>,
    /// Sent upstream as `HTTP-Referer`
    pub referer: Option<String>,
    /// Additional or overriding model table entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelEntry>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
