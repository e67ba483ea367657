//! HTTP transport for hub requests.
//!
//! [`Transport`] is the seam between the retry loop and the network. The
//! production [`HttpTransport`] wraps a pooled reqwest client and maps its
//! failures onto [`PublishError`] so the publisher can tell transient
//! problems from requests that can never succeed.

use std::{collections::HashMap, fmt::Debug, time::Duration};

use bytes::Bytes;
use reqwest::{Method, Response};

use crate::{
    config::{Credentials, HubConfig},
    error::{PublishError, Result},
};

/// Largest response body kept verbatim for failure logs.
const MAX_RESPONSE_BODY_SIZE: usize = 64 * 1024;

/// Size a larger body is cut down to.
const TRUNCATED_BODY_SIZE: usize = 1024;

/// One outgoing hub request.
#[derive(Debug, Clone)]
pub struct HubRequest {
    /// HTTP method (always POST for publishes).
    pub method: Method,
    /// Fully built hub URL.
    pub url: String,
    /// Encoded envelope.
    pub body: Bytes,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Total time allowed for the request, if bounded.
    pub timeout: Option<Duration>,
}

/// What the hub answered.
#[derive(Debug, Clone)]
pub struct HubResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body (limited size).
    pub body: String,
}

impl HubResponse {
    /// Whether the status is in the 2xx class.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Sends hub requests.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status, and an error only when no response was obtained.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends `request` and waits for the response.
    async fn send(&self, request: HubRequest) -> Result<HubResponse>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    /// Creates a transport using the connect timeout, user agent and
    /// credentials in `config`. The request timeout travels with each
    /// [`HubRequest`].
    ///
    /// # Errors
    ///
    /// Returns `PublishError::ConfigurationError` if the HTTP client cannot
    /// be built with the provided settings.
    pub fn new(config: &HubConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);

        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        let client = builder
            .build()
            .map_err(|e| PublishError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, credentials: config.credentials.clone() })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HubRequest) -> Result<HubResponse> {
        let start_time = std::time::Instant::now();

        let mut http_request = self.client.request(request.method, &request.url).body(request.body);
        for (key, value) in &request.headers {
            http_request = http_request.header(key, value);
        }
        if let Some(timeout) = request.timeout {
            http_request = http_request.timeout(timeout);
        }
        http_request = match &self.credentials {
            Some(Credentials::Bearer(token)) => http_request.bearer_auth(token),
            Some(Credentials::Basic { username, password }) => {
                http_request.basic_auth(username, password.as_deref())
            },
            None => http_request,
        };

        let response = http_request.send().await.map_err(|e| {
            tracing::debug!(
                duration_ms = start_time.elapsed().as_millis(),
                "hub request failed: {}",
                e
            );
            classify_reqwest_error(&e)
        })?;

        let status_code = response.status().as_u16();
        let body = read_body(response).await;
        let duration = start_time.elapsed();

        tracing::debug!(status = status_code, duration_ms = duration.as_millis(), "hub responded");

        Ok(HubResponse { status_code, body })
    }
}

/// Maps a reqwest failure onto the publish error taxonomy.
fn classify_reqwest_error(error: &reqwest::Error) -> PublishError {
    if error.is_timeout() {
        return PublishError::timeout(error.to_string());
    }
    if error.is_builder() {
        return PublishError::invalid_request(error.to_string());
    }
    if error.is_connect() {
        return PublishError::network(format!("connection failed: {error}"));
    }
    PublishError::network(error.to_string())
}

async fn read_body(response: Response) -> String {
    match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_RESPONSE_BODY_SIZE => {
            let suffix = "... (truncated)";
            let truncated = String::from_utf8_lossy(&bytes[..TRUNCATED_BODY_SIZE - suffix.len()]);
            format!("{truncated}{suffix}")
        },
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!("failed to read hub response body: {}", e);
            format!("[failed to read response body: {e}]")
        },
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn create_test_request(url: String) -> HubRequest {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());

        HubRequest {
            method: Method::POST,
            url,
            body: Bytes::from_static(br#"{"type":"order_created"}"#),
            headers,
            timeout: None,
        }
    }

    fn transport(config: &HubConfig) -> HttpTransport {
        HttpTransport::new(config).unwrap()
    }

    #[tokio::test]
    async fn successful_request() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/v1/messages"))
            .and(matchers::header("content-type", "application/json"))
            .and(matchers::header("accept", "application/json"))
            .and(matchers::body_string(r#"{"type":"order_created"}"#))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = transport(&HubConfig::new(mock_server.uri()));
        let response = transport
            .send(create_test_request(format!("{}/api/v1/messages", mock_server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status_code, 204);
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn server_error_is_a_response() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        let transport = transport(&HubConfig::new(mock_server.uri()));
        let response =
            transport.send(create_test_request(format!("{}/x", mock_server.uri()))).await.unwrap();

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, "Internal Server Error");
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn large_body_truncated() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(
                ResponseTemplate::new(502).set_body_string("x".repeat(MAX_RESPONSE_BODY_SIZE + 1)),
            )
            .mount(&mock_server)
            .await;

        let transport = transport(&HubConfig::new(mock_server.uri()));
        let response =
            transport.send(create_test_request(format!("{}/x", mock_server.uri()))).await.unwrap();

        assert_eq!(response.body.len(), TRUNCATED_BODY_SIZE);
        assert!(response.body.ends_with("... (truncated)"));
    }

    #[tokio::test]
    async fn timeout_classified() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let request = HubRequest {
            timeout: Some(Duration::from_millis(100)),
            ..create_test_request(format!("{}/x", mock_server.uri()))
        };
        let error = transport(&HubConfig::new(mock_server.uri()))
            .send(request)
            .await
            .unwrap_err();

        assert!(matches!(error, PublishError::Timeout { .. }), "got {error:?}");
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_classified() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = transport(&HubConfig::new(format!("http://{addr}")))
            .send(create_test_request(format!("http://{addr}/api/v1/messages")))
            .await
            .unwrap_err();

        assert!(matches!(error, PublishError::NetworkError { .. }), "got {error:?}");
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn malformed_url_not_retryable() {
        let error = transport(&HubConfig::new("service-hub"))
            .send(create_test_request("service-hub/api/v1/messages".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(error, PublishError::InvalidRequest { .. }), "got {error:?}");
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn bearer_credentials_sent() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::header("authorization", "Bearer hub-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = HubConfig {
            credentials: Some(Credentials::Bearer("hub-token".to_string())),
            ..HubConfig::new(mock_server.uri())
        };
        let response = transport(&config)
            .send(create_test_request(format!("{}/x", mock_server.uri())))
            .await
            .unwrap();

        assert!(response.is_success());
    }

    #[tokio::test]
    async fn basic_credentials_sent() {
        let mock_server = MockServer::start().await;

        // "hub:secret"
        Mock::given(matchers::method("POST"))
            .and(matchers::header("authorization", "Basic aHViOnNlY3JldA=="))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = HubConfig {
            credentials: Some(Credentials::Basic {
                username: "hub".to_string(),
                password: Some("secret".to_string()),
            }),
            ..HubConfig::new(mock_server.uri())
        };
        let response = transport(&config)
            .send(create_test_request(format!("{}/x", mock_server.uri())))
            .await
            .unwrap();

        assert!(response.is_success());
    }
}
