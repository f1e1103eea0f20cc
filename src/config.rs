//! Configuration consumed by the credential chain and the lookup providers.
//!
//! Reading the configuration file is left to the embedding application;
//! these types deserialize from any `serde` format.

use serde::Deserialize;
use std::time::Duration;

/// Timeout applied to provider HTTP requests when nothing overrides it.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cloud when none is configured.
pub const DEFAULT_CLOUD: &str = "global";

/// Authentication methods tried when neither the caller nor configuration
/// names any.
pub const DEFAULT_AUTH_METHODS: &[&str] = &["cli", "msi", "interactive"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "Azure", alias = "azure")]
    pub azure: AzureSettings,
    /// HTTP timeout in seconds.
    #[serde(rename = "http_timeout", alias = "httpTimeout")]
    pub http_timeout: Option<f64>,
}

impl Settings {
    /// Configured HTTP timeout, or [`DEFAULT_HTTP_TIMEOUT`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
            .and_then(seconds_to_duration)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT)
    }
}

/// The `Azure` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub cloud: Option<String>,
    pub tenant_id: Option<String>,
    pub auth_methods: Option<Vec<String>>,
}

impl AzureSettings {
    #[must_use]
    pub fn cloud(&self) -> &str {
        self.cloud.as_deref().unwrap_or(DEFAULT_CLOUD)
    }

    #[must_use]
    pub fn auth_methods(&self) -> Vec<String> {
        self.auth_methods.clone().unwrap_or_else(|| {
            DEFAULT_AUTH_METHODS
                .iter()
                .map(ToString::to_string)
                .collect()
        })
    }
}

/// Per-provider options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(rename = "ApiID", alias = "ApiId")]
    pub api_id: Option<String>,
    #[serde(rename = "AuthKey")]
    pub auth_key: Option<String>,
    /// HTTP timeout in seconds.
    #[serde(rename = "httpTimeout", alias = "http_timeout")]
    pub http_timeout: Option<f64>,
}

impl ProviderConfig {
    /// API identifier, trimmed. Blank values are treated as absent.
    #[must_use]
    pub fn api_id(&self) -> Option<&str> {
        non_blank(self.api_id.as_deref())
    }

    /// API key, trimmed. Blank values are treated as absent.
    #[must_use]
    pub fn auth_key(&self) -> Option<&str> {
        non_blank(self.auth_key.as_deref())
    }

    /// Provider timeout, falling back to the global settings.
    #[must_use]
    pub fn http_timeout(&self, settings: &Settings) -> Duration {
        self.http_timeout
            .and_then(seconds_to_duration)
            .unwrap_or_else(|| settings.http_timeout())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|d| !d.is_zero())
}
