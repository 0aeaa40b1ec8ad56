//! Named synchronisation points shared by every actor of a run.
//!
//! Each sync point accumulates at most one vote per participant. Votes live in
//! a barrier service reachable over the network; the [`BarrierClient`] submits
//! this actor's vote and polls the full vote map until a caller-supplied
//! validator holds. The service contract is captured by
//! [`BarrierTransport`], with an HTTP implementation for real runs and an
//! in-memory one that also backs the reference service in [`service`].

mod client;
mod http;
mod memory;
pub mod service;
mod transport;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub use client::{ARRIVED, BarrierClient, DEFAULT_POLL_INTERVAL, all_voted};
pub use http::HttpBarrierTransport;
pub use memory::MemoryBarrier;
pub use transport::{BarrierFuture, BarrierTransport};

/// Stable 0-based index of an actor within the run's roster.
pub type ParticipantId = usize;

/// Current votes for one sync point. Participants that never voted are absent.
pub type Votes = BTreeMap<ParticipantId, serde_json::Value>;

/// Caller-chosen name of a sync point, scoped to one run.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SyncId(String);

impl SyncId {
    /// Creates a sync point identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identifier as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SyncId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SyncId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u32> for SyncId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

/// Namespace under which a run's sync points live.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RunId(String);

impl RunId {
    /// Creates a run identifier, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::InvalidRunId`] when the identifier is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, BarrierError> {
        let trimmed = value.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(BarrierError::InvalidRunId);
        }
        Ok(Self(trimmed))
    }

    /// Generates a fresh, run-unique identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised by barrier operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BarrierError {
    /// Raised when the barrier service cannot be reached or fails on its side.
    #[error("barrier service unavailable: {message}")]
    Transport {
        /// Description of the underlying failure.
        message: String,
    },
    /// Raised when a wait does not see its validator hold before the deadline.
    #[error("timed out after {waited:?} waiting for sync point {sync_id}{}", last_error_suffix(.last_error.as_deref()))]
    Timeout {
        /// Sync point being waited on.
        sync_id: SyncId,
        /// Deadline that elapsed.
        waited: Duration,
        /// Most recent transport failure, when the last poll failed.
        last_error: Option<String>,
    },
    /// Raised when the service refuses a request with a client error status.
    #[error("barrier service rejected {url} with status {status}")]
    Rejected {
        /// Request URL.
        url: String,
        /// HTTP status code returned.
        status: u16,
    },
    /// Raised when the service answers with a payload that breaks the contract.
    #[error("invalid barrier response: {message}")]
    InvalidResponse {
        /// Description of the malformed payload.
        message: String,
    },
    /// Raised when the configured service endpoint is unusable.
    #[error("invalid barrier endpoint {url}: {message}")]
    InvalidEndpoint {
        /// Endpoint as configured.
        url: String,
        /// Why it was rejected.
        message: String,
    },
    /// Raised when a participant index falls outside the roster.
    #[error("participant {participant} is not part of a run with {actor_count} actors")]
    UnknownParticipant {
        /// Offending participant index.
        participant: ParticipantId,
        /// Number of actors in the run.
        actor_count: usize,
    },
    /// Raised when a run identifier is blank.
    #[error("run identifier must not be blank")]
    InvalidRunId,
}

impl BarrierError {
    /// Returns `true` for failures that a poll loop may retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

fn last_error_suffix(last_error: Option<&str>) -> String {
    last_error.map_or_else(String::new, |message| format!(" (last error: {message})"))
}
