//! Mock fetcher for testing
//!
//! Returns a scripted sequence of responses without touching the network, so
//! poll loop behaviour can be tested deterministically.
//!
//! # Example
//!
//! ```
//! use friendradar::fetcher::{Fetch, FetchResponse};
//! use friendradar::fetcher::mock::MockFetcher;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fetcher = MockFetcher::new("http://feed.test/users");
//! fetcher.push_response(FetchResponse::new(503, ""));
//!
//! assert_eq!(fetcher.fetch().await.status, 503);
//! // Script exhausted: falls back to a transport failure
//! assert_eq!(fetcher.fetch().await.status, -1);
//! assert_eq!(fetcher.call_count(), 2);
//! # });
//! ```

use super::{Fetch, FetchResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted fetcher
///
/// Clones share the same script and call counter, so a test can keep a clone
/// while the poll loop owns another.
#[derive(Debug, Clone)]
pub struct MockFetcher {
    url: String,

    /// Responses returned in order
    script: Arc<Mutex<VecDeque<FetchResponse>>>,

    /// Returned once the script is exhausted
    fallback: Arc<Mutex<FetchResponse>>,

    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    /// Create a mock whose fallback is a transport failure
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(FetchResponse::transport_failure())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a response
    pub fn push_response(&self, response: FetchResponse) {
        self.script.lock().push_back(response);
    }

    /// Replace the response returned after the script runs out
    pub fn set_fallback(&self, response: FetchResponse) {
        *self.fallback.lock() = response;
    }

    /// Number of `fetch` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetch for MockFetcher {
    async fn fetch(&self) -> FetchResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().clone())
    }

    fn url(&self) -> &str {
        &self.url
    }
}
