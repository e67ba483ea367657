//! Client for publishing messages to the service hub.
//!
//! A message is a type (or a caller-built envelope), an environment tag and
//! an arbitrary JSON content payload. [`Publisher`] encodes it, POSTs it to
//! `{endpoint_url}/api/{version}/messages`, and retries transient failures
//! with jittered exponential backoff.
//!
//! # Error handling
//!
//! - Missing configuration fails fast with
//!   [`PublishError::ConfigurationError`] before any network activity.
//! - Timeouts, connection failures and non-2xx responses are retried while
//!   the [`BackoffSequence`] allows, then returned to the caller unchanged.
//! - Cancellation during a request or a backoff sleep returns
//!   [`PublishError::Cancelled`].
//!
//! # Example
//!
//! ```no_run
//! use hub_client::{BackoffSequence, HubConfig, Publisher, PublishError};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), PublishError> {
//! let config = HubConfig::new("http://service-hub.com")
//!     .with_environment("il-qa2")
//!     .with_retry_policy(BackoffSequence::default());
//! let publisher = Publisher::new(config)?;
//!
//! publisher.publish("order_created", &json!({"order_id": 42}), None).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod config;
pub mod envelope;
pub mod error;
pub mod logger;
pub mod publisher;
pub mod time;
pub mod transport;

pub use backoff::{BackoffSequence, NoRetry, RetryInterval};
pub use config::{Credentials, EnvironmentPolicy, HubConfig};
pub use envelope::{build_hub_url, build_hub_url_with_version, Metadata};
pub use error::{ErrorCategory, PublishError, Result};
pub use logger::{HubLogger, NoopLogger, TracingLogger};
pub use publisher::{Publisher, PublisherBuilder};
pub use time::{Clock, RealClock, TestClock};
pub use transport::{HttpTransport, HubRequest, HubResponse, Transport};

/// Hub API version in the publish path.
pub const HUB_API_VERSION: &str = "v1";

/// Default base delay before the first retry, in seconds.
pub const DEFAULT_INITIAL_DELAY_SECS: f64 = 0.5;

/// Default backoff growth factor.
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Default symmetric jitter fraction.
pub const DEFAULT_JITTER_FACTOR: f64 = 0.05;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("hub-client/", env!("CARGO_PKG_VERSION"));
