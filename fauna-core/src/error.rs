use thiserror::Error;

use crate::DataSource;
use crate::store::StoreError;

/// Failures raised while talking to an upstream API.
///
/// Variants only carry strings so test doubles can clone and replay them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request exceeded the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Timeout ceiling in seconds.
        timeout_secs: u64,
    },
    /// The upstream answered with a non-success status.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Error description.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder error description.
        message: String,
    },
    /// A request URL could not be built from the configured base URL.
    #[error("invalid request URL {url:?}: {message}")]
    InvalidUrl {
        /// URL text that failed to parse.
        url: String,
        /// Parser error description.
        message: String,
    },
}

/// Errors raised by [`Provider::fetch`](crate::Provider::fetch) and the
/// operations built on top of it.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A required API key was not configured.
    #[error("{variable} is not set")]
    MissingCredential {
        /// Provider that required the key.
        provider: DataSource,
        /// Name of the configuration variable holding the key.
        variable: &'static str,
    },
    /// An outbound call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// No taxonomy entry matched a species query.
    #[error("no species matches {query:?}")]
    NotFound {
        /// Query that produced no match.
        query: String,
    },
    /// Persisting a record failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProviderError {
    /// Whether a retry policy may attempt the call again.
    ///
    /// Only transport failures qualify; a malformed request URL fails the
    /// same way on every attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(err) if !matches!(err, TransportError::InvalidUrl { .. }))
    }
}
