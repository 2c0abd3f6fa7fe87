//! FriendRadar - friend proximity tracker
//!
//! FriendRadar keeps a fixed reference point ("you") and a set of remote friend
//! locations that are refreshed periodically from an HTTP endpoint, and answers
//! proximity queries against them.
//!
//! # Architecture
//!
//! - **geo**: Haversine distance, unit conversion, distance labels
//! - **fetcher**: Single-shot HTTP GET with soft failure (`status = -1`)
//! - **registry**: Parses the feed and publishes immutable entity snapshots
//! - **poll**: Background poll loop with cooperative stop
//! - **display**: Visibility toggle and user-facing messages for a front end

pub mod config;
pub mod display;
pub mod fetcher;
pub mod geo;
pub mod logging;
pub mod poll;
pub mod registry;

// Re-export commonly used types
pub use config::Config;
pub use fetcher::{Fetch, FetchResponse, HttpFetcher};
pub use geo::Coordinate;
pub use poll::{PollEvent, PollHandle, PollLoop, PollState};
pub use registry::{Entity, LocationRegistry};

/// Result type used throughout FriendRadar
pub type Result<T> = anyhow::Result<T>;
