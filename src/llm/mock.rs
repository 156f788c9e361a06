use super::client::{BackendKind, GenerativeBackend};
use super::error::BackendError;
use super::types::{Completion, GenerationRequest};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Queue-driven backend for tests
///
/// Responses are returned in the order they were added; every request is
/// recorded so tests can inspect the prompts the pipeline built.
pub struct MockGenerativeBackend {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<GenerationRequest>>,
    name: String,
    kind: BackendKind,
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Text(String),
    Structured(Map<String, Value>),
    Error(BackendError),
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        MockResponse::Text(content.into())
    }

    /// Structured response from a JSON object; non-objects become empty maps.
    pub fn structured(value: Value) -> Self {
        match value {
            Value::Object(map) => MockResponse::Structured(map),
            _ => MockResponse::Structured(Map::new()),
        }
    }

    pub fn error(error: BackendError) -> Self {
        MockResponse::Error(error)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockGenerativeBackend {
    pub fn new() -> Self {
        Self::with_kind(BackendKind::LocalServer)
    }

    /// A mock that reports the given kind, e.g. `CloudKey` to exercise retries.
    pub fn with_kind(kind: BackendKind) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
            kind,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn add_response(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        lock(&self.responses).extend(responses);
    }

    pub fn remaining_responses(&self) -> usize {
        lock(&self.responses).len()
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Default for MockGenerativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeBackend for MockGenerativeBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<Completion, BackendError> {
        lock(&self.requests).push(request.clone());

        let response = lock(&self.responses)
            .pop_front()
            .ok_or_else(|| BackendError::Other {
                message: "MockGenerativeBackend: No more responses in queue".to_string(),
            })?;

        match response {
            MockResponse::Text(text) => Ok(Completion::Text(text)),
            MockResponse::Structured(map) => Ok(Completion::Structured(map)),
            MockResponse::Error(error) => Err(error),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }
}
