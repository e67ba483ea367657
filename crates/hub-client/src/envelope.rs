//! Message envelope assembly and hub URL construction.

use serde_json::{Map, Value};

use crate::{
    config::{EnvironmentPolicy, HubConfig},
    error::PublishError,
    Result,
};

/// Identifies what is being published.
///
/// Either a bare type name, or a caller-built envelope whose `type`, `env`
/// and any extra fields are sent as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    /// Envelope starts as `{"type": name}`.
    TypeName(String),
    /// Envelope starts as this object.
    Envelope(Map<String, Value>),
}

impl Metadata {
    /// The message type, when present as a string.
    pub fn message_type(&self) -> Option<&str> {
        match self {
            Self::TypeName(name) => Some(name),
            Self::Envelope(fields) => fields.get("type").and_then(Value::as_str),
        }
    }
}

impl From<&str> for Metadata {
    fn from(name: &str) -> Self {
        Self::TypeName(name.to_string())
    }
}

impl From<String> for Metadata {
    fn from(name: String) -> Self {
        Self::TypeName(name)
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(fields: Map<String, Value>) -> Self {
        Self::Envelope(fields)
    }
}

/// Builds the JSON body for one publish.
///
/// `env` is resolved from, in order: `env_override`, an `env` string on
/// structured metadata, then [`HubConfig::environment`]. Empty strings are
/// skipped. When nothing resolves the field is removed, or the call fails if
/// the config requires an environment.
///
/// # Errors
///
/// Returns `PublishError::ConfigurationError` for an unresolved `env` under
/// [`EnvironmentPolicy::Required`], and `PublishError::Serialization` if
/// double-encoding the content fails.
pub fn build_envelope(
    metadata: Metadata,
    content: Value,
    env_override: Option<&str>,
    config: &HubConfig,
) -> Result<Map<String, Value>> {
    let mut envelope = match metadata {
        Metadata::TypeName(name) => {
            let mut fields = Map::new();
            fields.insert("type".to_string(), Value::String(name));
            fields
        },
        Metadata::Envelope(fields) => fields,
    };

    let env = resolve_env(env_override, &envelope, config).map(str::to_owned);
    match env {
        Some(env) => {
            envelope.insert("env".to_string(), Value::String(env));
        },
        None if config.environment_policy == EnvironmentPolicy::Required => {
            return Err(PublishError::configuration("env missing"));
        },
        None => {
            envelope.remove("env");
        },
    }

    let content = if config.double_encode_content {
        Value::String(serde_json::to_string(&content)?)
    } else {
        content
    };
    envelope.insert("content".to_string(), content);

    Ok(envelope)
}

fn resolve_env<'a>(
    env_override: Option<&'a str>,
    envelope: &'a Map<String, Value>,
    config: &'a HubConfig,
) -> Option<&'a str> {
    let non_empty = |env: &&str| !env.is_empty();

    env_override
        .filter(non_empty)
        .or_else(|| envelope.get("env").and_then(Value::as_str).filter(non_empty))
        .or_else(|| config.default_environment())
}

/// Publish endpoint for `endpoint_url` at [`HUB_API_VERSION`](crate::HUB_API_VERSION).
///
/// One trailing `/` on the base URL is dropped so the result always has a
/// single separator before `api`.
pub fn build_hub_url(endpoint_url: &str) -> String {
    build_hub_url_with_version(endpoint_url, crate::HUB_API_VERSION)
}

/// Publish endpoint for `endpoint_url` at an explicit API version.
pub fn build_hub_url_with_version(endpoint_url: &str, version: &str) -> String {
    let base = endpoint_url.strip_suffix('/').unwrap_or(endpoint_url);
    format!("{base}/api/{version}/messages")
}
