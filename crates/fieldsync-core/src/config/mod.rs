//! Engine configuration loaded from the process environment.

use std::collections::HashMap;
use std::time::Duration;

use crate::models::Payload;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_API_BASE_URL: &str = "FIELDSYNC_API_BASE_URL";
const ENV_API_TOKEN: &str = "FIELDSYNC_API_TOKEN";
const ENV_HEALTH_URL: &str = "FIELDSYNC_HEALTH_URL";
const ENV_SYNC_INTERVAL_SECS: &str = "FIELDSYNC_SYNC_INTERVAL_SECS";
const ENV_DEBOUNCE_MS: &str = "FIELDSYNC_DEBOUNCE_MS";
const ENV_IDENTITY_PREFIX: &str = "FIELDSYNC_IDENTITY_";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Runtime settings for the sync engine.
#[derive(Clone, PartialEq)]
pub struct EngineConfig {
    /// Base URL of the record and metadata API. `None` means sync is not
    /// configured and only local capture is available.
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    /// Reachability probe target; defaults to `{api_base_url}/health`.
    pub health_url: Option<String>,
    pub sync_interval: Duration,
    pub debounce: Duration,
    /// Fields sent with every remote create and never on update.
    pub identity: Payload,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            health_url: None,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            identity: Payload::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `FIELDSYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        parse_config(std::env::vars())
    }

    #[must_use]
    pub const fn is_sync_configured(&self) -> bool {
        self.api_base_url.is_some()
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EngineConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("health_url", &self.health_url)
            .field("sync_interval", &self.sync_interval)
            .field("debounce", &self.debounce)
            .field("identity", &self.identity)
            .finish()
    }
}

fn parse_config(vars: impl IntoIterator<Item = (String, String)>) -> Result<EngineConfig> {
    let vars: HashMap<String, String> = vars.into_iter().collect();
    let lookup = |key: &str| normalize_text_option(vars.get(key).cloned());

    let api_base_url = lookup(ENV_API_BASE_URL)
        .map(|url| normalize_url(ENV_API_BASE_URL, &url))
        .transpose()?;
    let health_url = match lookup(ENV_HEALTH_URL) {
        Some(url) => Some(normalize_url(ENV_HEALTH_URL, &url)?),
        None => api_base_url.as_ref().map(|base| format!("{base}/health")),
    };

    let sync_interval = Duration::from_secs(parse_positive(
        ENV_SYNC_INTERVAL_SECS,
        lookup(ENV_SYNC_INTERVAL_SECS),
        DEFAULT_SYNC_INTERVAL_SECS,
    )?);
    let debounce = Duration::from_millis(parse_positive(
        ENV_DEBOUNCE_MS,
        lookup(ENV_DEBOUNCE_MS),
        DEFAULT_DEBOUNCE_MS,
    )?);

    let mut identity = Payload::new();
    let mut identity_vars: Vec<_> = vars
        .iter()
        .filter_map(|(key, value)| {
            let field = key.strip_prefix(ENV_IDENTITY_PREFIX)?.to_ascii_lowercase();
            let value = normalize_text_option(Some(value.clone()))?;
            (!field.is_empty()).then_some((field, value))
        })
        .collect();
    identity_vars.sort();
    for (field, value) in identity_vars {
        identity.insert(field, serde_json::Value::String(value));
    }

    Ok(EngineConfig {
        api_base_url,
        api_token: lookup(ENV_API_TOKEN),
        health_url,
        sync_interval,
        debounce,
        identity,
    })
}

fn normalize_url(name: &str, value: &str) -> Result<String> {
    if !is_http_url(value) {
        return Err(Error::InvalidInput(format!(
            "{name} must start with http:// or https://"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_positive(name: &str, value: Option<String>, default: u64) -> Result<u64> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a positive integer, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(pairs: &[(&str, &str)]) -> Result<EngineConfig> {
        parse_config(
            pairs
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string())),
        )
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(!config.is_sync_configured());
    }

    #[test]
    fn health_url_defaults_to_api_base() {
        let config = parse(&[(ENV_API_BASE_URL, " https://api.example.com/ ")]).unwrap();
        assert_eq!(
            config.api_base_url.as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(
            config.health_url.as_deref(),
            Some("https://api.example.com/health")
        );
    }

    #[test]
    fn rejects_invalid_urls_and_numbers() {
        assert!(parse(&[(ENV_API_BASE_URL, "api.example.com")]).is_err());
        assert!(parse(&[(ENV_SYNC_INTERVAL_SECS, "0")]).is_err());

        let err = parse(&[(ENV_DEBOUNCE_MS, "soon")]).unwrap_err();
        assert!(err.to_string().contains(ENV_DEBOUNCE_MS));
    }

    #[test]
    fn identity_fields_are_lowercased() {
        let config = parse(&[
            ("FIELDSYNC_IDENTITY_INSPECTOR_ID", "42"),
            ("FIELDSYNC_IDENTITY_DEVICE", " tablet-7 "),
            ("FIELDSYNC_IDENTITY_EMPTY", "  "),
        ])
        .unwrap();

        assert_eq!(config.identity.len(), 2);
        assert_eq!(config.identity["inspector_id"], json!("42"));
        assert_eq!(config.identity["device"], json!("tablet-7"));
    }

    #[test]
    fn debug_redacts_token() {
        let config = parse(&[(ENV_API_TOKEN, "secret-token")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
    }
}
