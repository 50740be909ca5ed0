//! `reqwest`-backed [`HttpTransport`].

use std::time::Duration;

use async_trait::async_trait;
use fauna_core::TransportError;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use super::{HttpRequest, HttpResponse, HttpTransport, Method};

/// Default user agent for upstream requests.
pub const DEFAULT_USER_AGENT: &str = "fauna-etl/0.1";

/// Default ceiling for a single outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error raised when the HTTP client cannot be built.
#[derive(Debug, Error)]
#[error("failed to build HTTP client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// Configuration for [`ReqwestTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Ceiling applied to every request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpClientConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
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

/// Production transport built on a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend or client cannot be initialised.
    pub fn new(config: &HttpClientConfig) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    fn convert_reqwest_error(
        error: &reqwest::Error,
        url: &str,
        timeout: Duration,
    ) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                url: url.to_owned(),
                timeout_secs: timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return TransportError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        TransportError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url().to_string();
        let timeout = request.timeout().unwrap_or(self.timeout);
        let convert = |err: reqwest::Error| Self::convert_reqwest_error(&err, &url, timeout);
        log::debug!("{:?} {url}", request.method());

        let mut builder = match request.method() {
            Method::Get => self.client.get(request.url().clone()),
            Method::Post => self.client.post(request.url().clone()),
        }
        .timeout(timeout);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(file) = request.file() {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)
                .map_err(convert)?;
            builder = builder.multipart(Form::new().part(file.field.clone(), part));
        }

        let response = builder
            .send()
            .await
            .map_err(convert)?
            .error_for_status()
            .map_err(convert)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(convert)?;

        Ok(HttpResponse {
            url,
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn config_builder_pattern() {
        let config = HttpClientConfig::new()
            .with_timeout(Duration::from_secs(10))
            .with_user_agent("test-agent/1.0");

        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.user_agent, "test-agent/1.0");
    }

    #[rstest]
    fn default_config_uses_thirty_second_ceiling() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[rstest]
    fn transport_builds_from_default_config() {
        let transport = ReqwestTransport::new(&HttpClientConfig::default());
        assert!(transport.is_ok());
    }
}
