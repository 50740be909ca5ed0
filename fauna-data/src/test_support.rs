//! Test doubles for the HTTP and taxonomy seams.
//!
//! [`StubTransport`] answers requests from per-route reply queues and keeps
//! a log of everything it was sent. [`StubTaxonomySource`] serves a fixed
//! reference list and counts loads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use fauna_core::{ProviderError, TaxonomyEntry, TransportError};
use serde_json::{Value, json};

use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::taxonomy::TaxonomySource;

/// Reply served by a [`StubTransport`] route: a JSON body or an error.
pub type StubReply = Result<String, TransportError>;

#[derive(Debug)]
struct StubRoute {
    pattern: String,
    replies: VecDeque<StubReply>,
}

impl StubRoute {
    fn next_reply(&mut self) -> Option<StubReply> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

/// [`HttpTransport`] double routing requests by URL substring.
///
/// The longest pattern contained in the request URL wins. Each route
/// serves its replies in order and repeats the last one forever. Requests
/// matching no route fail with a network error.
///
/// # Examples
///
/// ```
/// use fauna_data::test_support::StubTransport;
///
/// let transport = StubTransport::new()
///     .route("/recent", "[]")
///     .route("/recent/amerob", r#"[{"obsId": "A"}]"#);
/// assert!(transport.requests().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct StubTransport {
    routes: Mutex<Vec<StubRoute>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    /// Transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer URLs containing `pattern` with `body`.
    #[must_use]
    pub fn route(self, pattern: impl Into<String>, body: impl Into<String>) -> Self {
        self.route_replies(pattern, vec![Ok(body.into())])
    }

    /// Fail URLs containing `pattern` with `error`.
    #[must_use]
    pub fn route_error(self, pattern: impl Into<String>, error: TransportError) -> Self {
        self.route_replies(pattern, vec![Err(error)])
    }

    /// Answer URLs containing `pattern` with `replies`, in order.
    #[must_use]
    pub fn route_replies(self, pattern: impl Into<String>, replies: Vec<StubReply>) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StubRoute {
                pattern: pattern.into(),
                replies: replies.into(),
            });
        self
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests whose URL contains `pattern`.
    #[must_use]
    pub fn request_count(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| request.url().as_str().contains(pattern))
            .count()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url().to_string();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let reply = {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            routes
                .iter_mut()
                .filter(|route| url.contains(&route.pattern))
                .max_by_key(|route| route.pattern.len())
                .and_then(StubRoute::next_reply)
        };

        match reply {
            Some(Ok(body)) => Ok(HttpResponse {
                url,
                status: 200,
                body: body.into_bytes(),
            }),
            Some(Err(err)) => Err(err),
            None => Err(TransportError::Network {
                url,
                message: "no stub route".into(),
            }),
        }
    }
}

/// [`TaxonomySource`] serving a fixed list and counting loads.
#[derive(Debug)]
pub struct StubTaxonomySource {
    entries: Vec<TaxonomyEntry>,
    failure: Mutex<Option<TransportError>>,
    loads: AtomicUsize,
}

impl StubTaxonomySource {
    /// Source serving `entries`.
    #[must_use]
    pub fn with_entries(entries: Vec<TaxonomyEntry>) -> Self {
        Self {
            entries,
            failure: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Source whose first load fails with `error`; later loads serve
    /// `entries`.
    #[must_use]
    pub fn failing_once(error: TransportError, entries: Vec<TaxonomyEntry>) -> Self {
        Self {
            entries,
            failure: Mutex::new(Some(error)),
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of loads performed.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaxonomySource for StubTaxonomySource {
    async fn load(&self) -> Result<Vec<TaxonomyEntry>, ProviderError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(self.entries.clone()),
        }
    }
}

/// Upstream observation item with identifier `obs_id`.
#[must_use]
pub fn sighting(obs_id: &str, common_name: &str) -> Value {
    json!({
        "obsId": obs_id,
        "comName": common_name,
        "sciName": format!("{common_name} sp."),
        "lat": 40.0,
        "lng": -3.7,
        "obsDt": "2024-05-01 07:30",
        "locName": "Test marsh",
        "howMany": 1
    })
}

/// JSON array body holding `items`.
#[must_use]
pub fn ebird_body(items: &[Value]) -> String {
    Value::from(items.to_vec()).to_string()
}

#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime")
        .block_on(future)
}
