//! Scoped network partitions.
//!
//! A partition suspends a set of transport links for the duration of a scope
//! and restores them on every exit path, including panics. Links carry a
//! [`Channel`] tag; coordination links (the path to the barrier service) are
//! never suspended, so actors can still synchronise while partitioned.

use thiserror::Error;

use crate::command::CommandError;

mod controller;
mod link;
mod registry;

pub use controller::{NetworkPartition, with_partition};
pub use link::{CommandLink, LINK_PLACEHOLDER, SimulatedLink};
pub use registry::LinkRegistry;

/// Traffic class a link carries.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Channel {
    /// Peer-to-peer traffic of the system under test. May be partitioned.
    Transport,
    /// Traffic to the barrier service. Never partitioned.
    Coordination,
}

/// A network path that can be switched off and on again.
pub trait LinkControl: Send + Sync {
    /// Unique name of the link.
    fn name(&self) -> &str;

    /// Traffic class of the link.
    fn channel(&self) -> Channel;

    /// Stops traffic on the link.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::Link`] when the link cannot be suspended.
    fn suspend(&self) -> Result<(), PartitionError>;

    /// Restores traffic on the link.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::Link`] when the link cannot be resumed.
    fn resume(&self) -> Result<(), PartitionError>;
}

/// Links a partition applies to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PartitionScope {
    /// Every registered transport link.
    All,
    /// The named links only.
    Only(Vec<String>),
}

/// Errors raised by partition control.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PartitionError {
    /// Raised when a scope names a link that is not registered.
    #[error("unknown link {name}")]
    UnknownLink {
        /// Requested link name.
        name: String,
    },
    /// Raised when a scope names a coordination link.
    #[error("link {name} carries coordination traffic and cannot be partitioned")]
    CoordinationLink {
        /// Requested link name.
        name: String,
    },
    /// Raised when a link name is registered twice.
    #[error("link {name} is already registered")]
    DuplicateLink {
        /// Duplicate link name.
        name: String,
    },
    /// Raised when a link command fails.
    #[error("failed to {action} link {name}: {source}")]
    Link {
        /// Link name.
        name: String,
        /// Action attempted, `suspend` or `resume`.
        action: &'static str,
        /// Underlying command failure.
        #[source]
        source: CommandError,
    },
}
