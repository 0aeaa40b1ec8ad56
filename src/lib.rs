//! Cross-actor synchronisation core for distributed file-sync system tests.
//!
//! A run is made of independent actor processes, possibly on different
//! machines, that coordinate through a shared barrier service. The crate
//! exposes the barrier client and its wire contract, a role dispatcher for
//! test-case specs, a scoped network partition controller, an exponential
//! retry timer, a directory-tree comparator used as a final-state oracle, and
//! a client for the file-sync daemon's ritual RPC interface.

pub mod barrier;
pub mod command;
pub mod config;
pub mod context;
pub mod dirtree;
pub mod dispatch;
pub mod partition;
pub mod retry;
pub mod ritual;
pub mod roster;
pub mod test_support;

pub use barrier::{
    BarrierClient, BarrierError, BarrierTransport, HttpBarrierTransport, MemoryBarrier,
    ParticipantId, RunId, SyncId, Votes,
};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, SyncdetConfig};
pub use context::{ActorContext, CaseError, ContextError};
pub use dirtree::{DirTree, DirTreeError, Node, PollOptions, TreeDigest};
pub use dispatch::{Assignment, TestSpec, lucky_actor};
pub use partition::{
    Channel, CommandLink, LinkControl, LinkRegistry, NetworkPartition, PartitionError,
    PartitionScope, SimulatedLink, with_partition,
};
pub use retry::RetryTimer;
pub use ritual::{RemoteErrorKind, RitualClient, RitualError};
pub use roster::{Actor, ActorRoster, RosterError};
