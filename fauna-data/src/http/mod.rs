//! Outbound HTTP plumbing shared by every provider.
//!
//! Providers describe requests as [`HttpRequest`] values and hand them to an
//! [`HttpTransport`]. [`ReqwestTransport`] is the production implementation;
//! tests substitute [`StubTransport`](crate::test_support::StubTransport).
//! Transports turn non-2xx answers into [`TransportError::Http`], so callers
//! only see successful bodies.

use std::time::Duration;

use async_trait::async_trait;
use fauna_core::TransportError;
use serde::de::DeserializeOwned;
use url::Url;

mod client;
mod retry;

pub use client::{
    ClientBuildError, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, HttpClientConfig, ReqwestTransport,
};
pub use retry::RetryPolicy;

/// HTTP method of an [`HttpRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET` with query parameters.
    Get,
    /// `POST` with a multipart file body.
    Post,
}

/// A file sent as a multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type of `bytes`.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// A request to an upstream API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    file: Option<FilePart>,
    timeout: Option<Duration>,
}

impl HttpRequest {
    /// `GET` request for `url`.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            file: None,
            timeout: None,
        }
    }

    /// Multipart `POST` uploading `file` to `url`.
    #[must_use]
    pub const fn post_file(url: Url, file: FilePart) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: Vec::new(),
            file: Some(file),
            timeout: None,
        }
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a URL-encoded query parameter.
    #[must_use]
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Override the transport's timeout for this request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Target URL, including query parameters.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Value of the first header called `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Per-request timeout override.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Multipart file body, for `POST` requests.
    #[must_use]
    pub const fn file(&self) -> Option<&FilePart> {
        self.file.as_ref()
    }
}

/// A successful upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// URL the response came from.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] when the body is not valid JSON
    /// for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|err| TransportError::Decode {
            url: self.url.clone(),
            message: err.to_string(),
        })
    }
}

/// Executes [`HttpRequest`]s.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and return the response of a 2xx answer.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Parse `base` joined with `path` segments into a request URL.
///
/// Trailing slashes on `base` are ignored and empty segments skipped, so
/// `endpoint("https://host/v2/", &["US", "recent"])` yields
/// `https://host/v2/US/recent`.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, TransportError> {
    let mut text = base.trim_end_matches('/').to_owned();
    for segment in segments.iter().filter(|segment| !segment.is_empty()) {
        text.push('/');
        text.push_str(segment.trim_matches('/'));
    }
    Url::parse(&text).map_err(|err| TransportError::InvalidUrl {
        url: text.clone(),
        message: err.to_string(),
    })
}
