//! Dispatcher configuration.
//!
//! A `DispatcherConfig` can be deserialized from any serde source or read
//! from `DISPATCH_*` environment variables.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DispatchError;

pub const ENV_BASE_URL: &str = "DISPATCH_BASE_URL";
pub const ENV_USER_AGENT: &str = "DISPATCH_USER_AGENT";
pub const ENV_PROXY: &str = "DISPATCH_PROXY";
pub const ENV_ACCEPT_INVALID_CERTS: &str = "DISPATCH_ACCEPT_INVALID_CERTS";

/// Settings for the pooled client behind a `ReqwestClientFactory`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub proxy: Option<Url>,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Absolute URL every relative request URL is resolved against.
    pub base_url: String,
    #[serde(default)]
    pub client: ClientConfig,
}

impl DispatcherConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: ClientConfig::default(),
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, DispatchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, keyed by the `ENV_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DispatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DispatchError::Config(format!("{ENV_BASE_URL} is not set")))?;

        let proxy = match lookup(ENV_PROXY).filter(|v| !v.is_empty()) {
            Some(raw) => Some(Url::parse(&raw).map_err(|e| {
                DispatchError::Config(format!("{ENV_PROXY} `{raw}` is not a URL: {e}"))
            })?),
            None => None,
        };

        let accept_invalid_certs = match lookup(ENV_ACCEPT_INVALID_CERTS) {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                DispatchError::Config(format!(
                    "{ENV_ACCEPT_INVALID_CERTS} must be true or false, got `{raw}`"
                ))
            })?,
            None => false,
        };

        Ok(Self {
            base_url,
            client: ClientConfig {
                user_agent: lookup(ENV_USER_AGENT).filter(|v| !v.is_empty()),
                proxy,
                accept_invalid_certs,
            },
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn base_url_only() {
        let config = DispatcherConfig::from_lookup(lookup(&[(ENV_BASE_URL, "http://api.local/")])).unwrap();
        assert_eq!(config, DispatcherConfig::new("http://api.local/"));
    }

    #[test]
    fn missing_base_url_is_an_error() {
        let err = DispatcherConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, DispatchError::Config(msg) if msg.contains(ENV_BASE_URL)));
    }

    #[test]
    fn all_variables() {
        let config = DispatcherConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "https://api.local/v1/"),
            (ENV_USER_AGENT, "svc/1.0"),
            (ENV_PROXY, "http://proxy.local:3128"),
            (ENV_ACCEPT_INVALID_CERTS, "TRUE"),
        ]))
        .unwrap();
        assert_eq!(config.client.user_agent.as_deref(), Some("svc/1.0"));
        assert_eq!(config.client.proxy.unwrap().host_str(), Some("proxy.local"));
        assert!(config.client.accept_invalid_certs);
    }

    #[test]
    fn bad_proxy_is_an_error() {
        let err = DispatcherConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://api.local/"),
            (ENV_PROXY, "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, DispatchError::Config(_)));
    }

    #[test]
    fn bad_flag_is_an_error() {
        let err = DispatcherConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://api.local/"),
            (ENV_ACCEPT_INVALID_CERTS, "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, DispatchError::Config(msg) if msg.contains("maybe")));
    }

    #[test]
    fn deserializes_with_client_defaults() {
        let config: DispatcherConfig =
            serde_json::from_str(r#"{"base_url":"http://api.local/"}"#).unwrap();
        assert_eq!(config.client, ClientConfig::default());

        let config: DispatcherConfig = serde_json::from_str(
            r#"{"base_url":"http://api.local/","client":{"proxy":"http://p.local/"}}"#,
        )
        .unwrap();
        assert_eq!(config.client.proxy.unwrap().as_str(), "http://p.local/");
        assert!(!config.client.accept_invalid_certs);
    }
}
