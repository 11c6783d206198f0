//! Scripted [`Transport`] for tests.

use std::{
    io,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use url::Url;

use super::{Transport, TransportError};

/// Canned reply for one route.
#[derive(Debug, Clone)]
pub enum StubResponse {
    /// Respond with `200 OK` and these bytes.
    Body(Vec<u8>),
    /// Respond with an HTTP error status.
    Status(u16),
    /// Fail before a status is received.
    NetworkFailure(io::ErrorKind),
}

#[derive(Debug, Default)]
struct StubState {
    routes: Vec<(String, StubResponse)>,
    requests: Vec<Url>,
}

/// Transport answering from routes matched by URL substring.
///
/// Routes are checked in registration order. Unmatched requests get a 404.
#[derive(Debug, Default)]
pub struct StubTransport {
    state: Mutex<StubState>,
}

impl StubTransport {
    /// Create a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer requests whose URL contains `needle` with `response`.
    #[must_use]
    pub fn with_route(self, needle: &str, response: StubResponse) -> Self {
        self.route(needle, response);
        self
    }

    /// Register or replace the response for URLs containing `needle`.
    pub fn route(&self, needle: &str, response: StubResponse) {
        let mut state = self.lock();
        state.routes.retain(|(existing, _)| existing != needle);
        state.routes.push((needle.to_owned(), response));
    }

    /// Every URL requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Url> {
        self.lock().requests.clone()
    }

    /// Number of requests whose URL contains `needle`.
    #[must_use]
    pub fn request_count(&self, needle: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|url| url.as_str().contains(needle))
            .count()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = {
            let mut state = self.lock();
            state.requests.push(url.clone());
            state
                .routes
                .iter()
                .find(|(needle, _)| url.as_str().contains(needle.as_str()))
                .map(|(_, response)| response.clone())
        };
        match response {
            Some(StubResponse::Body(bytes)) => Ok(bytes),
            Some(StubResponse::Status(status)) => Err(TransportError::Http {
                url: url.to_string(),
                status,
                message: format!("stubbed status {status}"),
            }),
            Some(StubResponse::NetworkFailure(kind)) => Err(TransportError::Network {
                url: url.to_string(),
                source: io::Error::new(kind, "stubbed network failure"),
            }),
            None => Err(TransportError::Http {
                url: url.to_string(),
                status: 404,
                message: "no stubbed route".to_owned(),
            }),
        }
    }
}
