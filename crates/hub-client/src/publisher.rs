//! Publish orchestration: envelope, dispatch, retry.
//!
//! A publish validates the configuration, builds the envelope once, then runs
//! a bounded retry loop around the transport. Every failed attempt is
//! reported to the [`HubLogger`] exactly once. Retryable failures consult the
//! [`RetryInterval`] and sleep through the [`Clock`]; once the interval gives
//! up, the last underlying error is returned unchanged.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, Instrument};
use uuid::Uuid;

use crate::{
    backoff::{NoRetry, RetryInterval},
    config::HubConfig,
    envelope::{build_envelope, build_hub_url, Metadata},
    error::{ErrorCategory, PublishError, Result},
    logger::{HubLogger, TracingLogger},
    time::{Clock, RealClock},
    transport::{HttpTransport, HubRequest, Transport},
};

/// Header carrying an identifier shared by every attempt of one publish.
pub const PUBLISH_ID_HEADER: &str = "X-Hub-Publish-Id";

/// Header carrying the 1-based attempt number.
pub const ATTEMPT_HEADER: &str = "X-Hub-Attempt";

/// Publishes messages to the hub.
///
/// Cheap to clone; clones share the configuration and collaborators.
#[derive(Debug, Clone)]
pub struct Publisher {
    config: Arc<HubConfig>,
    transport: Arc<dyn Transport>,
    retry_interval: Arc<dyn RetryInterval>,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn HubLogger>,
}

impl Publisher {
    /// Creates a publisher using the reqwest transport, real clock and
    /// `tracing` logger.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::ConfigurationError` if the HTTP client cannot be
    /// built.
    pub fn new(config: HubConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Starts a builder for injecting collaborators.
    pub fn builder(config: HubConfig) -> PublisherBuilder {
        PublisherBuilder {
            config,
            transport: None,
            retry_interval: None,
            clock: None,
            logger: None,
        }
    }

    /// The configuration this publisher was built with.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Publishes `content` as a message described by `metadata`.
    ///
    /// `env_override`, when non-empty, replaces any other `env` source.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError` before any network activity when the endpoint
    ///   is missing, or when the environment is required but unresolved
    /// - `Serialization` when `content` cannot be encoded
    /// - the last delivery error once retries are exhausted
    pub async fn publish<C>(
        &self,
        metadata: impl Into<Metadata>,
        content: &C,
        env_override: Option<&str>,
    ) -> Result<()>
    where
        C: Serialize + ?Sized,
    {
        self.publish_with_cancellation(metadata, content, env_override, &CancellationToken::new())
            .await
    }

    /// Same as [`publish`](Self::publish), aborting with
    /// `PublishError::Cancelled` as soon as `cancellation` fires, whether a
    /// request is in flight or a backoff sleep is pending.
    ///
    /// # Errors
    ///
    /// See [`publish`](Self::publish).
    pub async fn publish_with_cancellation<C>(
        &self,
        metadata: impl Into<Metadata>,
        content: &C,
        env_override: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<()>
    where
        C: Serialize + ?Sized,
    {
        self.config.validate()?;

        let metadata = metadata.into();
        let message_type = metadata.message_type().unwrap_or_default().to_string();
        let content = serde_json::to_value(content)?;
        let envelope = build_envelope(metadata, content, env_override, &self.config)?;
        let payload = serde_json::to_string(&envelope)?;
        let url = build_hub_url(&self.config.endpoint_url);
        let publish_id = Uuid::new_v4();

        let span = info_span!(
            "hub_publish",
            message_type = %message_type,
            url = %url,
            publish_id = %publish_id
        );

        self.dispatch(url, payload, publish_id, cancellation).instrument(span).await
    }

    async fn dispatch(
        &self,
        url: String,
        payload: String,
        publish_id: Uuid,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let body = Bytes::from(payload.clone());
        let mut attempt: u32 = 1;

        loop {
            let request = HubRequest {
                method: Method::POST,
                url: url.clone(),
                body: body.clone(),
                headers: request_headers(publish_id, attempt),
                timeout: self.config.timeout,
            };

            let started = self.clock.now();
            let outcome = tokio::select! {
                biased;
                () = cancellation.cancelled() => return Err(PublishError::Cancelled),
                outcome = self.transport.send(request) => outcome,
            };
            let elapsed = self.clock.now().saturating_duration_since(started);

            let error = match outcome {
                Ok(response) if response.is_success() => {
                    trace!(attempt, status = response.status_code, "message published");
                    return Ok(());
                },
                Ok(response) => PublishError::http_status(response.status_code, response.body),
                Err(error) => error,
            };

            self.logger.warn(&failure_message(attempt, &error, elapsed, &payload));

            if !error.is_retryable() {
                return Err(error);
            }

            let Some(delay) = self.retry_interval.next(attempt) else {
                debug!(attempt, "retry budget exhausted");
                return Err(error);
            };

            debug!(attempt, delay_ms = delay.as_millis(), "retrying hub publish");

            tokio::select! {
                biased;
                () = cancellation.cancelled() => return Err(PublishError::Cancelled),
                () = self.clock.sleep(delay) => {},
            }

            attempt = attempt.saturating_add(1);
        }
    }
}

/// Builder for [`Publisher`].
#[derive(Debug)]
pub struct PublisherBuilder {
    config: HubConfig,
    transport: Option<Arc<dyn Transport>>,
    retry_interval: Option<Arc<dyn RetryInterval>>,
    clock: Option<Arc<dyn Clock>>,
    logger: Option<Arc<dyn HubLogger>>,
}

impl PublisherBuilder {
    /// Sends requests through `transport` instead of reqwest.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses `interval` instead of `config.retry_policy`.
    #[must_use]
    pub fn retry_interval(mut self, interval: Arc<dyn RetryInterval>) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    /// Sleeps through `clock` between retries.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Reports failed attempts to `logger`.
    #[must_use]
    pub fn logger(mut self, logger: Arc<dyn HubLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Builds the publisher, creating the reqwest transport if none was
    /// injected.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::ConfigurationError` if the HTTP client cannot be
    /// built.
    pub fn build(self) -> Result<Publisher> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };

        let retry_interval: Arc<dyn RetryInterval> =
            match (self.retry_interval, &self.config.retry_policy) {
                (Some(interval), _) => interval,
                (None, Some(policy)) => Arc::new(policy.clone()),
                (None, None) => Arc::new(NoRetry),
            };

        Ok(Publisher {
            config: Arc::new(self.config),
            transport,
            retry_interval,
            clock: self.clock.unwrap_or_else(|| Arc::new(RealClock::new())),
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
        })
    }
}

fn request_headers(publish_id: Uuid, attempt: u32) -> HashMap<String, String> {
    HashMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
        (PUBLISH_ID_HEADER.to_string(), publish_id.to_string()),
        (ATTEMPT_HEADER.to_string(), attempt.to_string()),
    ])
}

/// Single-line description of a failed attempt for the [`HubLogger`].
fn failure_message(
    attempt: u32,
    error: &PublishError,
    elapsed: Duration,
    payload: &str,
) -> String {
    let mut message = format!(
        "hub publish attempt {attempt} failed after {}ms ({}): {error}",
        elapsed.as_millis(),
        ErrorCategory::from(error)
    );
    if let Some(status_code) = error.status_code() {
        message.push_str(&format!("; status: {status_code}"));
    }
    if let Some(body) = error.response_body().filter(|body| !body.is_empty()) {
        message.push_str(&format!("; response: {body}"));
    }
    message.push_str(&format!("; payload: {payload}"));
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_includes_response_details() {
        let error = PublishError::http_status(500, "Internal Server Error");
        let message = failure_message(
            2,
            &error,
            Duration::from_millis(250),
            r#"{"type":"order_created"}"#,
        );

        assert_eq!(
            message,
            "hub publish attempt 2 failed after 250ms (http): hub responded with HTTP 500; status: 500; \
             response: Internal Server Error; payload: {\"type\":\"order_created\"}"
        );
    }

    #[test]
    fn failure_message_for_transport_errors() {
        let error = PublishError::timeout("operation timed out");
        let message = failure_message(1, &error, Duration::from_secs(30), "{}");

        assert_eq!(
            message,
            "hub publish attempt 1 failed after 30000ms (timeout): request timeout: operation timed out; \
             payload: {}"
        );
    }

    #[test]
    fn headers_mark_json_and_attempt() {
        let publish_id = Uuid::new_v4();
        let headers = request_headers(publish_id, 3);

        assert_eq!(headers["Content-Type"], "application/json");
        assert_eq!(headers["Accept"], "application/json");
        assert_eq!(headers[PUBLISH_ID_HEADER], publish_id.to_string());
        assert_eq!(headers[ATTEMPT_HEADER], "3");
    }

    #[test]
    fn publisher_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Publisher>();
    }
}
