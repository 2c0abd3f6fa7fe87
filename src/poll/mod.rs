//! Background poll loop
//!
//! The poll loop refreshes the [`LocationRegistry`] from a [`Fetch`]
//! implementation at a fixed interval. It runs as its own tokio task so network
//! IO and payload parsing never happen on the foreground context; only
//! [`PollEvent`] values and registry snapshots cross back.
//!
//! # Cycle
//!
//! 1. Sleep for the interval (woken early by stop/interrupt)
//! 2. Fetch
//! 3. On 200: refresh the registry and send [`PollEvent::DataChanged`] whether
//!    or not the payload parsed
//! 4. Otherwise: log, send [`PollEvent::NoResponse`], carry on
//!
//! No cycle failure ends the loop. Only [`PollHandle::stop`],
//! [`PollHandle::interrupt`] or dropping the handle does, checked at each
//! wake-up. There is no backoff; the interval is fixed.
//!
//! # Example
//!
//! ```no_run
//! use friendradar::fetcher::HttpFetcher;
//! use friendradar::geo::Coordinate;
//! use friendradar::poll::PollLoop;
//! use friendradar::registry::LocationRegistry;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let registry = Arc::new(LocationRegistry::new(Coordinate::new(51.297269, 1.069740)?));
//! let fetcher = HttpFetcher::new("https://example.com/LocalUsers.php", None)?;
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! let handle = PollLoop::new(fetcher, Arc::clone(&registry))
//!     .with_events(tx)
//!     .start(Duration::from_secs(5));
//!
//! if let Some(event) = rx.recv().await {
//!     println!("{:?}: {} friends", event, registry.len());
//! }
//!
//! handle.stop();
//! handle.join().await?;
//! # Ok(())
//! # }
//! ```

mod event;

pub use event::{CycleError, PollEvent, PollState, PollStats, StopReason};

use crate::config::cli_convert::duration_to_ms;
use crate::fetcher::Fetch;
use crate::registry::LocationRegistry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// State shared between a loop and its handle
#[derive(Debug)]
struct Shared {
    state: Mutex<PollState>,
    cycles: AtomicU64,
    refreshes: AtomicU64,
    no_response: AtomicU64,
    parse_failures: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(PollState::Idle),
            cycles: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            no_response: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
        }
    }

    fn state(&self) -> PollState {
        *self.state.lock()
    }

    /// Move `from -> to`; returns false if the loop was not in `from`
    fn transition(&self, from: PollState, to: PollState) -> bool {
        let mut state = self.state.lock();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn stats(&self) -> PollStats {
        PollStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            no_response: self.no_response.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
        }
    }
}

/// A poll loop that has not been started yet
pub struct PollLoop<F: Fetch> {
    fetcher: Arc<F>,
    registry: Arc<LocationRegistry>,
    events: Option<mpsc::UnboundedSender<PollEvent>>,
    shared: Arc<Shared>,
}

impl<F: Fetch + 'static> PollLoop<F> {
    /// Create an idle loop that feeds `registry` from `fetcher`
    pub fn new(fetcher: F, registry: Arc<LocationRegistry>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            registry,
            events: None,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Send cycle notifications to `events`
    ///
    /// A closed receiver is tolerated; the loop keeps polling.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<PollEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> PollState {
        self.shared.state()
    }

    pub fn stats(&self) -> PollStats {
        self.shared.stats()
    }

    /// Run one fetch-then-parse cycle without sleeping
    ///
    /// Returns the number of entities registered.
    pub async fn poll_once(&self) -> Result<usize, CycleError> {
        self.shared.cycles.fetch_add(1, Ordering::Relaxed);

        let response = self.fetcher.fetch().await;
        if !response.is_ok() {
            self.shared.no_response.fetch_add(1, Ordering::Relaxed);
            return Err(CycleError::NoResponse {
                url: self.fetcher.url().to_string(),
                status: response.status,
            });
        }

        match self.registry.refresh(&response.body) {
            Ok(count) => {
                self.shared.refreshes.fetch_add(1, Ordering::Relaxed);
                Ok(count)
            }
            Err(e) => {
                self.shared.parse_failures.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    /// Spawn the loop on the current tokio runtime (`Idle -> Running`)
    ///
    /// Must be called from within a runtime context.
    pub fn start(self, interval: Duration) -> PollHandle {
        let (stop_tx, stop_rx) = watch::channel(None);

        self.shared.transition(PollState::Idle, PollState::Running);
        let shared = Arc::clone(&self.shared);

        let task = tokio::spawn(async move {
            self.run(interval, stop_rx).await;
        });

        PollHandle {
            shared,
            stop_tx,
            task,
        }
    }

    async fn run(self, interval: Duration, mut stop_rx: watch::Receiver<Option<StopReason>>) {
        tracing::info!(
            url = %self.fetcher.url(),
            interval_ms = duration_to_ms(interval),
            "Poll loop started"
        );

        let reason = loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        // Every handle is gone
                        break StopReason::Interrupted;
                    }
                }
                _ = tokio::time::sleep(interval) => {}
            }

            // Wake-up boundary: honour any pending stop before fetching
            let pending = *stop_rx.borrow_and_update();
            if let Some(reason) = pending {
                break reason;
            }

            self.cycle().await;
        };

        self.shared.transition(PollState::Running, PollState::Stopped);
        tracing::info!(reason = ?reason, stats = ?self.shared.stats(), "Poll loop stopped");
        self.notify(PollEvent::Stopped { reason });
    }

    async fn cycle(&self) {
        match self.poll_once().await {
            Ok(count) => {
                tracing::debug!(count, "Registry refreshed");
                self.notify(PollEvent::DataChanged {
                    entities: Some(count),
                });
            }
            Err(CycleError::Parse(e)) => {
                tracing::warn!(error = %e, "Rejected payload, keeping previous entities");
                self.notify(PollEvent::DataChanged { entities: None });
            }
            Err(CycleError::NoResponse { url, status }) => {
                tracing::warn!(url = %url, status, "No response from endpoint");
                self.notify(PollEvent::NoResponse { url, status });
            }
        }
    }

    fn notify(&self, event: PollEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                tracing::trace!("Event receiver closed, notification dropped");
            }
        }
    }
}

/// Control handle for a running loop
///
/// Dropping every handle interrupts the loop at its next wake-up.
#[derive(Debug)]
pub struct PollHandle {
    shared: Arc<Shared>,
    stop_tx: watch::Sender<Option<StopReason>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn state(&self) -> PollState {
        self.shared.state()
    }

    pub fn stats(&self) -> PollStats {
        self.shared.stats()
    }

    /// Request a stop (`Running -> Stopped`)
    pub fn stop(&self) {
        self.signal(StopReason::Requested);
    }

    /// Stop because of an external shutdown signal
    pub fn interrupt(&self) {
        self.signal(StopReason::Interrupted);
    }

    fn signal(&self, reason: StopReason) {
        if self.shared.transition(PollState::Running, PollState::Stopped) {
            tracing::debug!(reason = ?reason, "Stop requested");
        }
        // First reason wins; later calls are no-ops
        self.stop_tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    /// Wait for the loop task to exit
    ///
    /// Only returns after [`stop`](Self::stop) or [`interrupt`](Self::interrupt).
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        let Self { task, stop_tx, .. } = self;
        let result = task.await;
        drop(stop_tx);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::mock::MockFetcher;
    use crate::fetcher::FetchResponse;
    use crate::geo::Coordinate;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(5);
    const PAYLOAD: &str = r#"{"Users":[{"lat":0,"lon":0,"name":"A"},{"lat":1,"lon":1,"name":"B"}]}"#;

    fn registry() -> Arc<LocationRegistry> {
        Arc::new(LocationRegistry::new(Coordinate::new(51.297269, 1.069740).unwrap()))
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<PollEvent>) -> PollEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for poll event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_poll_once_success() {
        let fetcher = MockFetcher::new("http://feed.test/");
        fetcher.push_response(FetchResponse::new(200, PAYLOAD));
        let registry = registry();

        let poll = PollLoop::new(fetcher, Arc::clone(&registry));
        assert_eq!(poll.state(), PollState::Idle);
        assert_eq!(poll.poll_once().await.unwrap(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            poll.stats(),
            PollStats {
                cycles: 1,
                refreshes: 1,
                no_response: 0,
                parse_failures: 0
            }
        );
    }

    #[tokio::test]
    async fn test_poll_once_non_200_is_no_response() {
        let fetcher = MockFetcher::new("http://feed.test/");
        fetcher.push_response(FetchResponse::new(200, PAYLOAD));
        fetcher.push_response(FetchResponse::new(404, "missing"));
        let registry = registry();

        let poll = PollLoop::new(fetcher, Arc::clone(&registry));
        poll.poll_once().await.unwrap();

        match poll.poll_once().await {
            Err(CycleError::NoResponse { url, status }) => {
                assert_eq!(url, "http://feed.test/");
                assert_eq!(status, 404);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // Transport failure collapses onto the same path
        assert!(matches!(
            poll.poll_once().await,
            Err(CycleError::NoResponse { status: -1, .. })
        ));
        assert_eq!(registry.len(), 2);
        assert_eq!(poll.stats().no_response, 2);
    }

    #[tokio::test]
    async fn test_poll_once_bad_payload_keeps_registry() {
        let fetcher = MockFetcher::new("http://feed.test/");
        fetcher.push_response(FetchResponse::new(200, PAYLOAD));
        fetcher.push_response(FetchResponse::new(200, r#"{"Users":[{"lat":"bad"}]}"#));
        let registry = registry();

        let poll = PollLoop::new(fetcher, Arc::clone(&registry));
        poll.poll_once().await.unwrap();
        assert!(matches!(poll.poll_once().await, Err(CycleError::Parse(_))));

        assert_eq!(registry.len(), 2);
        assert_eq!(poll.stats().parse_failures, 1);
    }

    #[tokio::test]
    async fn test_loop_survives_repeated_503() {
        let fetcher = MockFetcher::new("http://feed.test/");
        fetcher.set_fallback(FetchResponse::new(503, ""));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = PollLoop::new(fetcher.clone(), registry())
            .with_events(tx)
            .start(TICK);
        assert_eq!(handle.state(), PollState::Running);

        for _ in 0..2 {
            assert_eq!(
                next_event(&mut rx).await,
                PollEvent::NoResponse {
                    url: "http://feed.test/".to_string(),
                    status: 503
                }
            );
        }
        assert_eq!(handle.state(), PollState::Running);
        assert!(handle.stats().no_response >= 2);

        handle.stop();
        assert_eq!(handle.state(), PollState::Stopped);
        timeout(WAIT, handle.join()).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_loop_refreshes_and_notifies_even_on_parse_failure() {
        let fetcher = MockFetcher::new("http://feed.test/");
        fetcher.push_response(FetchResponse::new(200, PAYLOAD));
        fetcher.push_response(FetchResponse::new(200, "garbage"));
        fetcher.set_fallback(FetchResponse::new(500, ""));
        let registry = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = PollLoop::new(fetcher, Arc::clone(&registry))
            .with_events(tx)
            .start(TICK);

        assert_eq!(
            next_event(&mut rx).await,
            PollEvent::DataChanged { entities: Some(2) }
        );
        assert_eq!(
            next_event(&mut rx).await,
            PollEvent::DataChanged { entities: None }
        );
        assert_eq!(registry.len(), 2);

        handle.stop();
        timeout(WAIT, handle.join()).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_sleep() {
        let fetcher = MockFetcher::new("http://feed.test/");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = PollLoop::new(fetcher.clone(), registry())
            .with_events(tx)
            .start(Duration::from_secs(3600));

        handle.stop();
        assert_eq!(
            next_event(&mut rx).await,
            PollEvent::Stopped {
                reason: StopReason::Requested
            }
        );
        timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_with_unbounded_interval() {
        let fetcher = MockFetcher::new("http://feed.test/");
        let handle = PollLoop::new(fetcher.clone(), registry()).start(Duration::MAX);

        handle.stop();
        timeout(WAIT, handle.join()).await.unwrap().unwrap();
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_interrupt_reports_reason_and_first_reason_wins() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PollLoop::new(MockFetcher::new("http://feed.test/"), registry())
            .with_events(tx)
            .start(Duration::from_secs(3600));

        handle.interrupt();
        handle.stop();

        assert_eq!(
            next_event(&mut rx).await,
            PollEvent::Stopped {
                reason: StopReason::Interrupted
            }
        );
        assert_eq!(handle.state(), PollState::Stopped);
        timeout(WAIT, handle.join()).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dropping_handle_interrupts_loop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PollLoop::new(MockFetcher::new("http://feed.test/"), registry())
            .with_events(tx)
            .start(Duration::from_secs(3600));

        drop(handle);
        assert_eq!(
            next_event(&mut rx).await,
            PollEvent::Stopped {
                reason: StopReason::Interrupted
            }
        );
    }

    #[tokio::test]
    async fn test_closed_receiver_does_not_stop_loop() {
        let fetcher = MockFetcher::new("http://feed.test/");
        fetcher.set_fallback(FetchResponse::new(200, PAYLOAD));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let handle = PollLoop::new(fetcher.clone(), registry())
            .with_events(tx)
            .start(TICK);

        timeout(WAIT, async {
            while fetcher.call_count() < 3 {
                tokio::time::sleep(TICK).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(handle.state(), PollState::Running);
        handle.stop();
        timeout(WAIT, handle.join()).await.unwrap().unwrap();
    }
}
