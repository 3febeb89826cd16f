//! Settings management for the `set` / `unset` commands.
//!
//! Each key maps to a parser that writes one `Config` field and a clearer
//! that resets it. The file is re-validated before it is saved.

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::config::{path_display, Config};
use crate::core::models::ModelCatalog;

/// Errors that can occur when modifying configuration settings.
#[derive(Debug)]
pub enum SettingError {
    UnknownKey(String),
    MissingValue {
        key: &'static str,
        example: &'static str,
    },
    InvalidValue {
        key: &'static str,
        reason: String,
    },
    /// Loading, validating, or saving the file failed.
    Config(String),
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(
                f,
                "Unknown config key: {key} (known keys: {})",
                SETTINGS
                    .iter()
                    .map(|setting| setting.key)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            SettingError::MissingValue { key, example } => {
                write!(f, "Missing value for {key}. Example: nexus set {key} {example}")
            }
            SettingError::InvalidValue { key, reason } => {
                write!(f, "Invalid value for {key}: {reason}")
            }
            SettingError::Config(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl Error for SettingError {}

type ApplyFn = fn(&mut Config, &str) -> Result<(), String>;
type ClearFn = fn(&mut Config);

struct Setting {
    key: &'static str,
    example: &'static str,
    apply: ApplyFn,
    clear: ClearFn,
}

const SETTINGS: &[Setting] = &[
    Setting {
        key: "backend",
        example: "simulated",
        apply: set_backend,
        clear: |config| config.backend = None,
    },
    Setting {
        key: "base-url",
        example: "https://openrouter.ai/api/v1",
        apply: |config, value| {
            config.base_url = Some(value.to_string());
            Ok(())
        },
        clear: |config| config.base_url = None,
    },
    Setting {
        key: "relay-url",
        example: "http://127.0.0.1:5000/chat",
        apply: |config, value| {
            config.relay_url = Some(value.to_string());
            Ok(())
        },
        clear: |config| config.relay_url = None,
    },
    Setting {
        key: "api-key-env",
        example: "OPENROUTER_API_KEY",
        apply: |config, value| {
            config.api_key_env = Some(value.to_string());
            Ok(())
        },
        clear: |config| config.api_key_env = None,
    },
    Setting {
        key: "timeout",
        example: "30",
        apply: set_timeout,
        clear: |config| config.timeout_secs = None,
    },
    Setting {
        key: "store-path",
        example: "~/nexus/conversations.json",
        apply: |config, value| {
            config.store_path = Some(PathBuf::from(value));
            Ok(())
        },
        clear: |config| config.store_path = None,
    },
    Setting {
        key: "default-model",
        example: "Llama 2 70B",
        apply: set_default_model,
        clear: |config| config.default_model = None,
    },
    Setting {
        key: "temperature",
        example: "0.7",
        apply: set_temperature,
        clear: |config| config.temperature = None,
    },
    Setting {
        key: "max-tokens",
        example: "2000",
        apply: set_max_tokens,
        clear: |config| config.max_tokens = None,
    },
    Setting {
        key: "app-title",
        example: "Nexus AI Assistant",
        apply: |config, value| {
            config.app_title = Some(value.to_string());
            Ok(())
        },
        clear: |config| config.app_title = None,
    },
    Setting {
        key: "referer",
        example: "https://example.com",
        apply: |config, value| {
            config.referer = Some(value.to_string());
            Ok(())
        },
        clear: |config| config.referer = None,
    },
];

fn set_backend(config: &mut Config, value: &str) -> Result<(), String> {
    config.backend = Some(value.parse()?);
    Ok(())
}

fn set_timeout(config: &mut Config, value: &str) -> Result<(), String> {
    let secs = value
        .parse::<u64>()
        .map_err(|_| format!("'{value}' is not a whole number of seconds"))?;
    config.timeout_secs = Some(secs);
    Ok(())
}

fn set_default_model(config: &mut Config, value: &str) -> Result<(), String> {
    let catalog = ModelCatalog::with_overrides(&config.models);
    let model = catalog
        .find(value)
        .ok_or_else(|| format!("unknown model '{value}'; run 'nexus models' to list them"))?;
    config.default_model = Some(model.display_name.clone());
    Ok(())
}

fn set_temperature(config: &mut Config, value: &str) -> Result<(), String> {
    let temperature = value
        .parse::<f32>()
        .map_err(|_| format!("'{value}' is not a number"))?;
    config.temperature = Some(temperature);
    Ok(())
}

fn set_max_tokens(config: &mut Config, value: &str) -> Result<(), String> {
    let max_tokens = value
        .parse::<u32>()
        .map_err(|_| format!("'{value}' is not a whole number"))?;
    config.max_tokens = Some(max_tokens);
    Ok(())
}

fn find_setting(key: &str) -> Result<&'static Setting, SettingError> {
    SETTINGS
        .iter()
        .find(|setting| setting.key.eq_ignore_ascii_case(key))
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))
}

/// Parse `value` into the field for `key`, then re-validate the whole config.
pub fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<&'static str, SettingError> {
    let setting = find_setting(key)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(SettingError::MissingValue {
            key: setting.key,
            example: setting.example,
        });
    }
    (setting.apply)(config, value).map_err(|reason| SettingError::InvalidValue {
        key: setting.key,
        reason,
    })?;
    config
        .validate()
        .map_err(|err| SettingError::Config(err.to_string()))?;
    Ok(setting.key)
}

pub fn clear_setting(config: &mut Config, key: &str) -> Result<&'static str, SettingError> {
    let setting = find_setting(key)?;
    (setting.clear)(config);
    Ok(setting.key)
}

fn load(config_path: &Path) -> Result<Config, SettingError> {
    Config::load_from_path(config_path).map_err(|err| SettingError::Config(err.to_string()))
}

fn save(config: &Config, config_path: &Path) -> Result<(), SettingError> {
    config
        .save_to_path(config_path)
        .map_err(|err| SettingError::Config(format!("{}: {err}", path_display(config_path))))
}

pub fn run_set(config_path: &Path, key: Option<String>, value: Vec<String>) -> Result<(), Box<dyn Error>> {
    let mut config = load(config_path)?;
    let Some(key) = key else {
        config.print_all();
        return Ok(());
    };

    let value = value.join(" ");
    let key = apply_setting(&mut config, &key, &value)?;
    save(&config, config_path)?;
    println!("✅ Set {key} to: {}", value.trim());
    Ok(())
}

pub fn run_unset(config_path: &Path, key: &str) -> Result<(), Box<dyn Error>> {
    let mut config = load(config_path)?;
    let key = clear_setting(&mut config, key)?;
    save(&config, config_path)?;
    println!("✅ Unset {key}");
    Ok(())
}
