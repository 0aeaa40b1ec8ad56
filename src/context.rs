//! Per-actor handle bundling the run, the roster, and a barrier client.

use std::time::Duration;

use camino::Utf8Path;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::barrier::{
    BarrierClient, BarrierError, BarrierTransport, HttpBarrierTransport, ParticipantId, RunId,
    SyncId, Votes,
};
use crate::config::{ConfigError, SyncdetConfig};
use crate::dirtree::DirTreeError;
use crate::dispatch::lucky_actor;
use crate::partition::PartitionError;
use crate::retry::RetryTimer;
use crate::ritual::RitualError;
use crate::roster::{Actor, ActorRoster, RosterError};

/// Errors raised while building an [`ActorContext`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ContextError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The roster could not be loaded.
    #[error(transparent)]
    Roster(#[from] RosterError),
    /// The barrier service is unusable.
    #[error(transparent)]
    Barrier(#[from] BarrierError),
    /// The configured actor index is not in the roster.
    #[error("actor index {index} is outside a roster of {actors} actors")]
    ActorOutOfRange {
        /// Configured index.
        index: usize,
        /// Roster size.
        actors: usize,
    },
}

/// Error type returned by test-case bodies.
#[derive(Debug, Error)]
pub enum CaseError {
    /// A barrier operation failed.
    #[error(transparent)]
    Barrier(#[from] BarrierError),
    /// A tree comparison or wait failed.
    #[error(transparent)]
    DirTree(#[from] DirTreeError),
    /// Partition control failed.
    #[error(transparent)]
    Partition(#[from] PartitionError),
    /// A daemon call failed.
    #[error(transparent)]
    Ritual(#[from] RitualError),
    /// The actor context could not be built.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// A test assertion failed.
    #[error("test case failed: {0}")]
    Failed(String),
}

/// Everything a test-case body needs to coordinate with the other actors.
#[derive(Clone, Debug)]
pub struct ActorContext<T> {
    client: BarrierClient<T>,
    roster: ActorRoster,
}

impl ActorContext<HttpBarrierTransport> {
    /// Builds the context described by `config`: loads the roster, waits for
    /// the barrier service to answer, and binds a client to this actor.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the configuration is invalid, the roster
    /// cannot be loaded, or the service does not come up in time.
    pub async fn connect(config: &SyncdetConfig) -> Result<Self, ContextError> {
        config.validate()?;
        let roster = ActorRoster::load(Utf8Path::new(&config.roster_file))?;
        let transport = HttpBarrierTransport::new(&config.barrier_url)?;
        transport
            .wait_until_ready(RetryTimer::default(), config.connect_timeout())
            .await?;
        let run = RunId::new(config.run_id.as_str())?;
        let context = Self::new(transport, run, config.actor_index, roster)?;
        Ok(context.with_timing(config.poll_interval(), config.sync_timeout()))
    }
}

impl<T: BarrierTransport> ActorContext<T> {
    /// Binds actor `index` of `roster` to `transport` within `run`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::ActorOutOfRange`] when `index` is not in the
    /// roster.
    pub fn new(
        transport: T,
        run: RunId,
        index: usize,
        roster: ActorRoster,
    ) -> Result<Self, ContextError> {
        let actors = roster.len();
        let client = BarrierClient::new(transport, run, index, actors)
            .map_err(|_| ContextError::ActorOutOfRange { index, actors })?;
        info!(run = %client.run(), actor = index, actors, "actor context ready");
        Ok(Self { client, roster })
    }

    /// Overrides the poll interval and the default sync deadline.
    #[must_use]
    pub fn with_timing(mut self, poll_interval: Duration, default_timeout: Option<Duration>) -> Self {
        self.client = self
            .client
            .with_poll_interval(poll_interval)
            .with_default_timeout(default_timeout);
        self
    }

    /// This actor's index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.client.participant()
    }

    /// This actor's roster entry.
    #[must_use]
    pub fn actor(&self) -> Option<&Actor> {
        self.roster.get(self.index())
    }

    /// The run's roster.
    #[must_use]
    pub const fn roster(&self) -> &ActorRoster {
        &self.roster
    }

    /// The run identifier.
    #[must_use]
    pub const fn run(&self) -> &RunId {
        self.client.run()
    }

    /// The underlying barrier client.
    #[must_use]
    pub const fn client(&self) -> &BarrierClient<T> {
        &self.client
    }

    /// Waits until every actor of the run reached `sync_id`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`BarrierClient::sync`].
    pub async fn sync(&self, sync_id: impl Into<SyncId>) -> Result<(), BarrierError> {
        self.client.sync(&sync_id.into(), None, None).await
    }

    /// Waits until the actors in `participants` reached `sync_id`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`BarrierClient::sync`].
    pub async fn sync_among(
        &self,
        sync_id: impl Into<SyncId>,
        participants: &[ParticipantId],
    ) -> Result<(), BarrierError> {
        self.client
            .sync(&sync_id.into(), Some(participants), None)
            .await
    }

    /// Submits this actor's vote for `sync_id`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`BarrierClient::vote`].
    pub async fn vote(&self, sync_id: impl Into<SyncId>, value: Value) -> Result<(), BarrierError> {
        self.client.vote(&sync_id.into(), value).await
    }

    /// Votes and waits on `sync_id` until `validator` holds.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`BarrierClient::wait`].
    pub async fn wait<V, F>(
        &self,
        sync_id: impl Into<SyncId>,
        validator: V,
        vote_fn: F,
    ) -> Result<Votes, BarrierError>
    where
        V: FnMut(&Votes) -> bool + Send,
        F: FnMut() -> Option<Value> + Send,
    {
        self.client
            .wait(&sync_id.into(), validator, vote_fn, None)
            .await
    }

    /// Index of the lucky actor for this run, seeded by the run identifier.
    #[must_use]
    pub fn lucky_index(&self) -> Option<usize> {
        lucky_actor(self.run().as_str(), self.roster.len())
    }

    /// Returns `true` when this actor is the run's lucky actor.
    #[must_use]
    pub fn is_lucky(&self) -> bool {
        self.lucky_index() == Some(self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::MemoryBarrier;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn roster() -> ActorRoster {
        ActorRoster::from_entries((0..3).map(|index| {
            (
                format!("10.0.0.{index}"),
                String::from("tester"),
                None,
            )
        }))
        .expect("roster")
    }

    fn context(store: &MemoryBarrier, roster: &ActorRoster, index: usize) -> ActorContext<MemoryBarrier> {
        ActorContext::new(
            store.clone(),
            RunId::new("ctx-run").expect("run id"),
            index,
            roster.clone(),
        )
        .expect("context")
        .with_timing(Duration::from_millis(5), Some(Duration::from_secs(5)))
    }

    #[rstest]
    fn exactly_one_actor_is_lucky(roster: ActorRoster) {
        let store = MemoryBarrier::new();
        let lucky: Vec<usize> = (0..3)
            .filter(|index| context(&store, &roster, *index).is_lucky())
            .collect();
        assert_eq!(lucky.len(), 1);
        assert_eq!(
            lucky.first().copied(),
            context(&store, &roster, 0).lucky_index()
        );
    }

    #[rstest]
    fn index_outside_roster_is_rejected(roster: ActorRoster) {
        let err = ActorContext::new(
            MemoryBarrier::new(),
            RunId::new("r").expect("run id"),
            3,
            roster,
        )
        .expect_err("index 3 of 3");
        assert_eq!(err, ContextError::ActorOutOfRange { index: 3, actors: 3 });
    }

    #[rstest]
    #[tokio::test]
    async fn sync_among_pairs_and_votes_are_shared(roster: ActorRoster) {
        let store = MemoryBarrier::new();
        let first = context(&store, &roster, 0);
        let third = context(&store, &roster, 2);

        let waiter = tokio::spawn(async move { first.sync_among("pair", &[0, 2]).await });
        third.sync_among("pair", &[0, 2]).await.expect("pair sync");
        waiter.await.expect("task").expect("pair sync");

        third.vote("answer", json!(42)).await.expect("vote");
        let votes = context(&store, &roster, 1)
            .wait("answer", |votes| votes.contains_key(&2), || None)
            .await
            .expect("vote visible");
        assert_eq!(votes.get(&2), Some(&json!(42)));
    }

    #[test]
    fn case_errors_wrap_component_errors() {
        let err = CaseError::from(DirTreeError::NoCandidates);
        assert_eq!(err.to_string(), DirTreeError::NoCandidates.to_string());
    }
}
