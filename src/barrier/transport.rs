//! Wire contract of the barrier service.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use super::{BarrierError, ParticipantId, RunId, SyncId, Votes};

/// Future returned by barrier transport operations.
pub type BarrierFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BarrierError>> + Send + 'a>>;

/// Minimal interface implemented by barrier service clients.
///
/// Vote submission is an idempotent upsert keyed by `(sync_id, participant)`.
/// A fetch returns the full current map for the sync point; participants that
/// never voted are absent rather than present with a placeholder.
pub trait BarrierTransport: Send + Sync {
    /// Stores `value` as `participant`'s vote, replacing any earlier vote.
    fn submit_vote<'a>(
        &'a self,
        run: &'a RunId,
        sync_id: &'a SyncId,
        participant: ParticipantId,
        value: &'a Value,
    ) -> BarrierFuture<'a, ()>;

    /// Returns every vote currently recorded for `sync_id`.
    fn fetch_votes<'a>(&'a self, run: &'a RunId, sync_id: &'a SyncId) -> BarrierFuture<'a, Votes>;

    /// Drops every sync point recorded under `run`.
    fn teardown<'a>(&'a self, run: &'a RunId) -> BarrierFuture<'a, ()>;
}
