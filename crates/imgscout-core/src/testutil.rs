//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::PageRequest;
use crate::orchestrator::{RunEvent, RunReporter};
use crate::traits::{ImageExtractor, Transport};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Canned transport outcome. Cloneable so one route can answer many times.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Bytes(Vec<u8>),
    Status(u16),
    Timeout,
    ConnectionRefused,
}

impl MockResponse {
    pub fn body(html: &str) -> Self {
        MockResponse::Bytes(html.as_bytes().to_vec())
    }

    fn into_result(self, url: &str) -> Result<Vec<u8>, AppError> {
        match self {
            MockResponse::Bytes(b) => Ok(b),
            MockResponse::Status(status) => Err(AppError::from_status(status, url)),
            MockResponse::Timeout => Err(AppError::Timeout(20)),
            MockResponse::ConnectionRefused => {
                Err(AppError::NetworkError("Connection failed: refused".into()))
            }
        }
    }
}

/// Mock transport answering per URL.
///
/// A route holds a queue of responses; each call pops the front until one
/// is left, which then repeats. Unrouted URLs get the fallback (HTTP 404).
#[derive(Clone)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    fallback: MockResponse,
    session: Arc<Mutex<Option<MockResponse>>>,
    calls: Arc<Mutex<Vec<PageRequest>>>,
    session_calls: Arc<Mutex<Vec<PageRequest>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
            fallback: MockResponse::Status(404),
            session: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
            session_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_route(self, url: &str, response: MockResponse) -> Self {
        self.with_sequence(url, vec![response])
    }

    pub fn with_sequence(self, url: &str, responses: Vec<MockResponse>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    /// Make `establish_session` fail with the given response.
    pub fn with_session_failure(self, response: MockResponse) -> Self {
        *self.session.lock().unwrap() = Some(response);
        self
    }

    /// Page requests issued so far, in order.
    pub fn calls(&self) -> Vec<PageRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn session_calls(&self) -> Vec<PageRequest> {
        self.session_calls.lock().unwrap().clone()
    }

    fn next_response(&self, url: &str) -> MockResponse {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

impl Transport for MockTransport {
    async fn fetch(&self, request: &PageRequest) -> Result<Vec<u8>, AppError> {
        self.calls.lock().unwrap().push(request.clone());
        self.next_response(&request.url).into_result(&request.url)
    }

    async fn establish_session(&self, request: &PageRequest) -> Result<(), AppError> {
        self.session_calls.lock().unwrap().push(request.clone());
        match self.session.lock().unwrap().clone() {
            Some(response) => response.into_result(&request.url).map(|_| ()),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor: content starting with a prefix yields the remainder.
#[derive(Clone)]
pub struct MockExtractor {
    prefix: String,
    error: Option<String>,
}

impl MockExtractor {
    pub fn prefixed(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            error: None,
        }
    }

    /// Extractor that errors on every page.
    pub fn failing() -> Self {
        Self {
            prefix: String::new(),
            error: Some("extractor blew up".into()),
        }
    }
}

impl ImageExtractor for MockExtractor {
    fn extract(&self, content: &str) -> Result<Option<String>, AppError> {
        if let Some(e) = &self.error {
            return Err(AppError::ExtractionError(e.clone()));
        }
        Ok(content
            .strip_prefix(&self.prefix)
            .map(|rest| rest.trim().to_string())
            .filter(|rest| !rest.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock run reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }

    /// Labels of `StateChanged` events, e.g. `"state:running"`.
    pub fn states(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.strip_prefix("state:").map(str::to_string))
            .collect()
    }
}

impl RunReporter for MockReporter {
    fn report(&self, event: RunEvent<'_>) {
        let label = match &event {
            RunEvent::StateChanged { state } => format!("state:{state}"),
            RunEvent::Loaded { .. } => "Loaded".to_string(),
            RunEvent::SessionEstablished { .. } => "SessionEstablished".to_string(),
            RunEvent::SessionFailed { .. } => "SessionFailed".to_string(),
            RunEvent::TargetFinished { .. } => "TargetFinished".to_string(),
            RunEvent::Cooldown { .. } => "Cooldown".to_string(),
            RunEvent::Progress { .. } => "Progress".to_string(),
            RunEvent::Flushed { .. } => "Flushed".to_string(),
            RunEvent::Finished { .. } => "Finished".to_string(),
        };
        self.events.lock().unwrap().push(label);
    }
}
