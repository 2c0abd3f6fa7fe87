//! Remote feed fetching
//!
//! A fetcher performs one HTTP GET against a fixed endpoint and hands back the
//! status code and the full body as text. Fetchers never retry; the poll loop
//! owns the retry cadence.
//!
//! # Soft failure
//!
//! Transport errors (refused connections, DNS failures, timeouts, broken bodies)
//! are not propagated. They are reported as [`TRANSPORT_FAILURE_STATUS`] with an
//! empty body so callers can treat every non-200 outcome the same way.
//!
//! # Implementations
//!
//! - [`HttpFetcher`]: reqwest client with connection reuse across polls
//! - [`mock::MockFetcher`]: scripted responses for tests

pub mod mock;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Status reported by [`Fetch::fetch`] when no HTTP response was obtained
pub const TRANSPORT_FAILURE_STATUS: i32 = -1;

/// The only status code treated as success
pub const STATUS_OK: i32 = 200;

/// Errors raised while constructing a fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    /// The endpoint URL cannot be used. Fatal: the caller must not proceed.
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Outcome of a single GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status, or [`TRANSPORT_FAILURE_STATUS`]
    pub status: i32,
    /// Full response body decoded as text
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: i32, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Response used for any transport-level failure
    pub fn transport_failure() -> Self {
        Self::new(TRANSPORT_FAILURE_STATUS, String::new())
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// A reusable single-shot GET against a configured endpoint
///
/// Implementations must be `Send + Sync` so one instance can be shared with the
/// background poll task and reused for every cycle.
pub trait Fetch: Send + Sync {
    /// Issue one GET and read the whole body
    ///
    /// Never fails: transport problems come back as
    /// [`FetchResponse::transport_failure`].
    fn fetch(&self) -> impl Future<Output = FetchResponse> + Send;

    /// The endpoint this fetcher targets
    fn url(&self) -> &str;
}

/// Parse and sanity-check an endpoint URL
///
/// Only absolute `http`/`https` URLs with a host are accepted. No network
/// traffic happens here.
pub fn parse_endpoint(url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(parsed)
}

/// HTTP fetcher backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// Validated endpoint
    url: Url,

    /// Original endpoint text, reported in logs and errors
    url_text: String,

    /// Reusable HTTP client with connection pooling
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher for `url`
    ///
    /// `timeout` bounds the whole request including the body read. `None`
    /// leaves timing entirely to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidEndpoint`] if the URL does not parse, is not
    /// http(s), or the HTTP client cannot be built for it.
    pub fn new(url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let parsed = parse_endpoint(url)?;

        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().map_err(|e| FetchError::InvalidEndpoint {
            url: url.to_string(),
            reason: format!("failed to build HTTP client: {}", e),
        })?;

        Ok(Self {
            url: parsed,
            url_text: url.to_string(),
            http,
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self) -> FetchResponse {
        let response = match self.http.get(self.url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %self.url_text, error = %e, "GET request failed");
                return FetchResponse::transport_failure();
            }
        };

        let status = i32::from(response.status().as_u16());

        match response.text().await {
            Ok(body) => {
                tracing::trace!(url = %self.url_text, status, bytes = body.len(), "GET completed");
                FetchResponse { status, body }
            }
            Err(e) => {
                tracing::debug!(url = %self.url_text, status, error = %e, "Failed to read response body");
                FetchResponse::transport_failure()
            }
        }
    }

    fn url(&self) -> &str {
        &self.url_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one raw HTTP response on an ephemeral port
    async fn serve_once(raw_response: &'static str) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 2048];
            let _ = socket.read(&mut buffer).await;
            socket.write_all(raw_response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        (format!("http://{}/LocalUsers.php", addr), server)
    }

    #[test]
    fn test_invalid_endpoints_rejected() {
        for url in ["", "not a url", "ftp://example.com/feed", "localhost:8080", "http://"] {
            let result = HttpFetcher::new(url, None);
            assert!(
                matches!(result, Err(FetchError::InvalidEndpoint { .. })),
                "expected InvalidEndpoint for {:?}",
                url
            );
        }
    }

    #[test]
    fn test_valid_endpoint_accepted() {
        let fetcher = HttpFetcher::new("https://example.com/users.php", Some(Duration::from_secs(3))).unwrap();
        assert_eq!(fetcher.url(), "https://example.com/users.php");
    }

    #[test]
    fn test_fetch_response_helpers() {
        assert!(FetchResponse::new(200, "{}").is_ok());
        assert!(!FetchResponse::new(503, "").is_ok());

        let failure = FetchResponse::transport_failure();
        assert_eq!(failure.status, TRANSPORT_FAILURE_STATUS);
        assert!(failure.body.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_ok_reads_full_body() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 13\r\nConnection: close\r\n\r\n{\"Users\": []}",
        )
        .await;

        let fetcher = HttpFetcher::new(&url, Some(Duration::from_secs(5))).unwrap();
        let response = fetcher.fetch().await;
        server.await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"Users\": []}");
    }

    #[tokio::test]
    async fn test_fetch_reports_non_200_status() {
        let (url, server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
        )
        .await;

        let fetcher = HttpFetcher::new(&url, Some(Duration::from_secs(5))).unwrap();
        let response = fetcher.fetch().await;
        server.await.unwrap();

        assert_eq!(response.status, 503);
        assert!(!response.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_transport_failure_is_soft() {
        // Grab a free port, then close it so the connection is refused
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(&format!("http://{}/", addr), Some(Duration::from_secs(2))).unwrap();
        let response = fetcher.fetch().await;

        assert_eq!(response, FetchResponse::transport_failure());
    }

    #[tokio::test]
    async fn test_fetcher_reusable_across_calls() {
        let (url, server) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let fetcher = HttpFetcher::new(&url, Some(Duration::from_secs(2))).unwrap();
        assert_eq!(fetcher.fetch().await.status, 404);
        server.await.unwrap();

        // Server is gone now; the same fetcher degrades to a soft failure
        assert_eq!(fetcher.fetch().await.status, TRANSPORT_FAILURE_STATUS);
    }
}
