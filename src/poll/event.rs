//! Poll loop outcomes and notifications

use crate::registry::ParseError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Lifecycle of a poll loop
///
/// `Idle -> Running -> Stopped`. There is no way back from `Stopped`; a new
/// loop has to be built to resume polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a loop left `Running`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// [`PollHandle::stop`](super::PollHandle::stop) was called
    Requested,
    /// Shutdown signal, or every handle was dropped
    Interrupted,
}

/// Failure of a single poll cycle
///
/// Both variants are recovered inside the loop; neither ends it.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Status was anything but 200, including transport failures (-1)
    #[error("no response from '{url}' (status {status})")]
    NoResponse { url: String, status: i32 },

    /// The body could not be applied to the registry
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Notification sent to the foreground after each cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A 200 response was processed. `entities` is the new count, or `None` if
    /// the payload was rejected and the previous entities were kept.
    DataChanged { entities: Option<usize> },

    /// The endpoint did not answer with 200
    NoResponse { url: String, status: i32 },

    /// The loop exited
    Stopped { reason: StopReason },
}

/// Counters for one poll loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub cycles: u64,
    pub refreshes: u64,
    pub no_response: u64,
    pub parse_failures: u64,
}
