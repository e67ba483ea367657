//! Layered configuration for the `hub-publish` command.

use std::{collections::BTreeMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use hub_client::{BackoffSequence, Credentials, EnvironmentPolicy, HubConfig};
use serde::{Deserialize, Serialize};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "hub.toml";

/// Prefix shared by every environment variable override.
const ENV_PREFIX: &str = "HUB_";

/// Keys read from the environment verbatim. figment would otherwise parse a
/// numeric token or password into a number and drop leading zeros.
const STRING_KEYS: &[&str] = &[
    "endpoint_url",
    "environment",
    "access_token",
    "http_auth_username",
    "http_auth_password",
    "log",
];

/// Publisher settings with defaults, file, and environment overrides.
///
/// Loaded in priority order:
/// 1. Environment variables prefixed `HUB_` (highest priority)
/// 2. Configuration file (`hub.toml` unless `--config` says otherwise)
/// 3. Built-in defaults (lowest priority)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the hub service.
    ///
    /// Environment variable: `HUB_ENDPOINT_URL`
    pub endpoint_url: String,

    /// Default `env` tag for published messages.
    ///
    /// Environment variable: `HUB_ENVIRONMENT`
    pub environment: Option<String>,

    /// Refuse to publish without a resolved `env`.
    ///
    /// Environment variable: `HUB_REQUIRE_ENVIRONMENT`
    pub require_environment: bool,

    /// Request timeout in milliseconds.
    ///
    /// Environment variable: `HUB_TIMEOUT_MS`
    pub timeout_ms: Option<u64>,

    /// Connect timeout in milliseconds.
    ///
    /// Environment variable: `HUB_CONNECT_TIMEOUT_MS`
    pub connect_timeout_ms: Option<u64>,

    /// Send content as an encoded JSON string.
    ///
    /// Environment variable: `HUB_DOUBLE_ENCODE_CONTENT`
    pub double_encode_content: bool,

    /// Retry failed publishes with backoff.
    ///
    /// Environment variable: `HUB_RETRY_ENABLED`
    pub retry_enabled: bool,

    /// Base delay before the first retry, in milliseconds.
    ///
    /// Environment variable: `HUB_RETRY_INITIAL_DELAY_MS`
    pub retry_initial_delay_ms: u64,

    /// Backoff growth factor.
    ///
    /// Environment variable: `HUB_RETRY_MULTIPLIER`
    pub retry_multiplier: f64,

    /// Jitter fraction (0.0 to 1.0).
    ///
    /// Environment variable: `HUB_RETRY_JITTER_FACTOR`
    pub retry_jitter_factor: f64,

    /// Retries allowed after the first attempt.
    ///
    /// Environment variable: `HUB_RETRY_MAX_ATTEMPTS`
    pub retry_max_attempts: u32,

    /// Bearer token for the hub.
    ///
    /// Environment variable: `HUB_ACCESS_TOKEN`
    pub access_token: Option<String>,

    /// Basic auth user name.
    ///
    /// Environment variable: `HUB_HTTP_AUTH_USERNAME`
    pub http_auth_username: Option<String>,

    /// Basic auth password.
    ///
    /// Environment variable: `HUB_HTTP_AUTH_PASSWORD`
    pub http_auth_password: Option<String>,

    /// Log filter directive.
    ///
    /// Environment variable: `HUB_LOG`
    pub log: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            environment: None,
            require_environment: false,
            timeout_ms: None,
            connect_timeout_ms: None,
            double_encode_content: false,
            retry_enabled: false,
            retry_initial_delay_ms: 500,
            retry_multiplier: hub_client::DEFAULT_MULTIPLIER,
            retry_jitter_factor: hub_client::DEFAULT_JITTER_FACTOR,
            retry_max_attempts: hub_client::DEFAULT_MAX_ATTEMPTS,
            access_token: None,
            http_auth_username: None,
            http_auth_password: None,
            log: "info,hub_client=debug".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from defaults, `path`, and `HUB_*` environment
    /// variables. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(STRING_KEYS))
            .merge(Serialized::defaults(raw_string_env()))
            .extract()
            .context("failed to load hub settings")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Converts to the publisher configuration.
    pub fn to_hub_config(&self) -> HubConfig {
        HubConfig {
            endpoint_url: self.endpoint_url.clone(),
            environment: self.environment.clone(),
            environment_policy: if self.require_environment {
                EnvironmentPolicy::Required
            } else {
                EnvironmentPolicy::Optional
            },
            timeout: self.timeout_ms.map(Duration::from_millis),
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            double_encode_content: self.double_encode_content,
            retry_policy: self.retry_enabled.then(|| self.to_backoff()),
            credentials: self.credentials(),
            ..HubConfig::default()
        }
    }

    fn to_backoff(&self) -> BackoffSequence {
        BackoffSequence::new(
            Duration::from_millis(self.retry_initial_delay_ms).as_secs_f64(),
            self.retry_multiplier,
            self.retry_jitter_factor,
            self.retry_max_attempts,
        )
    }

    /// Basic auth wins when both credential kinds are set.
    fn credentials(&self) -> Option<Credentials> {
        match (&self.http_auth_username, &self.access_token) {
            (Some(username), _) => Some(Credentials::Basic {
                username: username.clone(),
                password: self.http_auth_password.clone(),
            }),
            (None, Some(token)) => Some(Credentials::Bearer(token.clone())),
            (None, None) => None,
        }
    }

    /// Validates value ranges. Presence of `endpoint_url` is checked by the
    /// publisher itself.
    fn validate(&self) -> Result<()> {
        if self.timeout_ms == Some(0) {
            anyhow::bail!("timeout_ms must be greater than 0");
        }

        if self.connect_timeout_ms == Some(0) {
            anyhow::bail!("connect_timeout_ms must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.retry_jitter_factor) {
            anyhow::bail!("retry_jitter_factor must be between 0.0 and 1.0");
        }

        if !self.retry_multiplier.is_finite() || self.retry_multiplier < 1.0 {
            anyhow::bail!("retry_multiplier must be at least 1.0");
        }

        Ok(())
    }
}

/// `HUB_*` values for [`STRING_KEYS`], unparsed. Empty values are skipped.
fn raw_string_env() -> BTreeMap<String, String> {
    Env::prefixed(ENV_PREFIX)
        .only(STRING_KEYS)
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.as_str().to_ascii_lowercase(), value))
        .collect()
}
