//! In-process vote store.
//!
//! Backs the reference barrier service and lets tests run several actors in
//! one process. Clones share the same store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::RwLock;

use super::transport::{BarrierFuture, BarrierTransport};
use super::{BarrierError, ParticipantId, RunId, SyncId, Votes};

type RunVotes = HashMap<SyncId, Votes>;

/// Shared in-memory barrier store.
#[derive(Clone, Debug)]
pub struct MemoryBarrier {
    runs: Arc<RwLock<HashMap<RunId, RunVotes>>>,
    reachable: Arc<AtomicBool>,
}

impl Default for MemoryBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBarrier {
    /// Creates an empty, reachable store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulates the service going down or coming back.
    ///
    /// While unreachable every operation fails with
    /// [`BarrierError::Transport`]; recorded votes are kept.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Returns the number of runs that currently hold at least one sync point.
    pub async fn run_count(&self) -> usize {
        self.runs.read().await.len()
    }

    fn ensure_reachable(&self) -> Result<(), BarrierError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BarrierError::Transport {
                message: String::from("connection refused"),
            })
        }
    }
}

impl BarrierTransport for MemoryBarrier {
    fn submit_vote<'a>(
        &'a self,
        run: &'a RunId,
        sync_id: &'a SyncId,
        participant: ParticipantId,
        value: &'a Value,
    ) -> BarrierFuture<'a, ()> {
        Box::pin(async move {
            self.ensure_reachable()?;
            let mut runs = self.runs.write().await;
            runs.entry(run.clone())
                .or_default()
                .entry(sync_id.clone())
                .or_default()
                .insert(participant, value.clone());
            Ok(())
        })
    }

    fn fetch_votes<'a>(&'a self, run: &'a RunId, sync_id: &'a SyncId) -> BarrierFuture<'a, Votes> {
        Box::pin(async move {
            self.ensure_reachable()?;
            let runs = self.runs.read().await;
            Ok(runs
                .get(run)
                .and_then(|points| points.get(sync_id))
                .cloned()
                .unwrap_or_default())
        })
    }

    fn teardown<'a>(&'a self, run: &'a RunId) -> BarrierFuture<'a, ()> {
        Box::pin(async move {
            self.ensure_reachable()?;
            self.runs.write().await.remove(run);
            Ok(())
        })
    }
}
