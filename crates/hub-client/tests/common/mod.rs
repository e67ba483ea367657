//! Scripted collaborators for publisher tests.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use hub_client::{
    HubLogger, HubRequest, HubResponse, PublishError, RetryInterval, TestClock, Transport,
};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Status(u16),
    Fail(PublishError),
}

/// Transport that replays a fixed list of outcomes and records requests.
///
/// Once the script runs out every further call answers 204.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HubRequest>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self { steps: Mutex::new(steps.into_iter().collect()), requests: Mutex::default() })
    }

    pub fn requests(&self) -> Vec<HubRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HubRequest) -> Result<HubResponse, PublishError> {
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Status(204));

        match step {
            Step::Status(status_code) => Ok(HubResponse {
                status_code,
                body: if status_code >= 300 { format!("status {status_code}") } else { String::new() },
            }),
            Step::Fail(error) => Err(error),
        }
    }
}

/// Transport whose requests never complete.
#[derive(Debug, Default)]
pub struct HangingTransport {
    requests: Mutex<Vec<HubRequest>>,
}

impl HangingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for HangingTransport {
    async fn send(&self, request: HubRequest) -> Result<HubResponse, PublishError> {
        self.requests.lock().unwrap().push(request);
        std::future::pending().await
    }
}

/// Transport that spends `latency` of virtual time on every request before
/// answering with `status_code`.
#[derive(Debug)]
pub struct SlowTransport {
    clock: TestClock,
    latency: Duration,
    status_code: u16,
}

impl SlowTransport {
    pub fn new(clock: TestClock, latency: Duration, status_code: u16) -> Arc<Self> {
        Arc::new(Self { clock, latency, status_code })
    }
}

#[async_trait::async_trait]
impl Transport for SlowTransport {
    async fn send(&self, _request: HubRequest) -> Result<HubResponse, PublishError> {
        self.clock.advance(self.latency);
        Ok(HubResponse { status_code: self.status_code, body: String::new() })
    }
}

/// Logger that keeps every message by level.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    warnings: Mutex<Vec<String>>,
    other: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn other_messages(&self) -> Vec<String> {
        self.other.lock().unwrap().clone()
    }
}

impl HubLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.other.lock().unwrap().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.other.lock().unwrap().push(message.to_string());
    }
}

/// Retry interval answering from a fixed list and recording each lookup.
#[derive(Debug, Default)]
pub struct ScriptedInterval {
    delays: Vec<Option<Duration>>,
    calls: Mutex<Vec<u32>>,
}

impl ScriptedInterval {
    /// `delays[n - 1]` answers `next(n)`; lookups past the end give up.
    pub fn new(delays: impl IntoIterator<Item = Option<Duration>>) -> Arc<Self> {
        Arc::new(Self { delays: delays.into_iter().collect(), calls: Mutex::default() })
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

impl RetryInterval for ScriptedInterval {
    fn next(&self, attempt: u32) -> Option<Duration> {
        self.calls.lock().unwrap().push(attempt);
        let index = usize::try_from(attempt).ok()?.checked_sub(1)?;
        self.delays.get(index).copied().flatten()
    }
}

/// In-memory sink for `tracing_subscriber::fmt` output.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedOutput {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
