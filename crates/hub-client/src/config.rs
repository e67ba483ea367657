//! Publisher configuration.
//!
//! [`HubConfig`] is an ordinary value owned by the host application. Build it
//! once at startup and hand it to [`Publisher::new`](crate::Publisher::new);
//! the publisher shares it read-only between concurrent publishes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{backoff::BackoffSequence, error::PublishError, Result};

/// Settings for publishing to the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    /// Base URL of the hub service. Required.
    pub endpoint_url: String,

    /// Default `env` tag attached to every message.
    pub environment: Option<String>,

    /// Whether a message may be published without a resolved `env`.
    pub environment_policy: EnvironmentPolicy,

    /// Overall request timeout passed to the transport.
    pub timeout: Option<Duration>,

    /// Connection establishment timeout passed to the transport.
    pub connect_timeout: Option<Duration>,

    /// Embed content as a JSON-encoded string instead of a nested object.
    pub double_encode_content: bool,

    /// Backoff between retries. `None` makes the first failure terminal.
    pub retry_policy: Option<BackoffSequence>,

    /// Credentials sent with every request.
    pub credentials: Option<Credentials>,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            environment: None,
            environment_policy: EnvironmentPolicy::default(),
            timeout: None,
            connect_timeout: None,
            double_encode_content: false,
            retry_policy: None,
            credentials: None,
            user_agent: crate::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HubConfig {
    /// Creates a configuration for `endpoint_url` with every other field at
    /// its default.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self { endpoint_url: endpoint_url.into(), ..Default::default() }
    }

    /// Sets the default environment tag.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Enables retries with the given backoff.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: BackoffSequence) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Checks that the endpoint is present.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::ConfigurationError` when `endpoint_url` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.trim().is_empty() {
            return Err(PublishError::configuration("endpoint_url missing"));
        }
        Ok(())
    }

    /// The configured environment, ignoring empty strings.
    pub fn default_environment(&self) -> Option<&str> {
        self.environment.as_deref().filter(|env| !env.is_empty())
    }
}

/// How to treat a message whose `env` cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentPolicy {
    /// Omit the `env` field.
    #[default]
    Optional,
    /// Fail with a configuration error before sending.
    Required,
}

/// Authentication attached to hub requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// HTTP basic authentication.
    Basic {
        /// User name
        username: String,
        /// Optional password
        password: Option<String>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::Basic { username, .. } => {
                f.debug_struct("Basic").field("username", username).finish_non_exhaustive()
            },
        }
    }
}
