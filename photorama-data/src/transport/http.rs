//! `reqwest`-backed [`Transport`].

use std::{io, time::Duration};

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, header::USER_AGENT};
use url::Url;

use super::{Transport, TransportError};

/// Default user agent for outgoing requests.
pub const DEFAULT_USER_AGENT: &str = "photorama/0.1";

/// Default timeout applied to each request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpTransportConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// HTTP transport sharing one connection pool across requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Build a transport from `config`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error raised when the client cannot be built,
    /// for example when the TLS backend fails to initialise.
    pub fn new(config: HttpTransportConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            user_agent: config.user_agent,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        debug!("{} {}", response.status(), url);
        let body = response
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url))?
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        Ok(body.to_vec())
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &Url) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_string(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_string(),
        source: io::Error::new(kind, error),
    }
}
