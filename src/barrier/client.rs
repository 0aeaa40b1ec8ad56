//! Vote-and-wait client used by test-case code.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::transport::BarrierTransport;
use super::{BarrierError, ParticipantId, RunId, SyncId, Votes};

/// Default interval between two polls of a sync point.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Marker voted by [`BarrierClient::sync`].
pub const ARRIVED: &str = "arrived";

/// Returns `true` when every participant in `expected` voted exactly `marker`.
#[must_use]
pub fn all_voted(votes: &Votes, expected: &[ParticipantId], marker: &Value) -> bool {
    expected
        .iter()
        .all(|participant| votes.get(participant) == Some(marker))
}

/// Barrier client bound to one participant of one run.
#[derive(Clone, Debug)]
pub struct BarrierClient<T> {
    transport: T,
    run: RunId,
    participant: ParticipantId,
    actor_count: usize,
    poll_interval: Duration,
    default_timeout: Option<Duration>,
}

impl<T: BarrierTransport> BarrierClient<T> {
    /// Creates a client voting as `participant` in a run of `actor_count`
    /// actors.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::UnknownParticipant`] when `participant` is not
    /// below `actor_count`.
    pub fn new(
        transport: T,
        run: RunId,
        participant: ParticipantId,
        actor_count: usize,
    ) -> Result<Self, BarrierError> {
        if participant >= actor_count {
            return Err(BarrierError::UnknownParticipant {
                participant,
                actor_count,
            });
        }
        Ok(Self {
            transport,
            run,
            participant,
            actor_count,
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: None,
        })
    }

    /// Overrides the interval between polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the deadline applied when a wait does not pass its own.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Index this client votes as.
    #[must_use]
    pub const fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Number of actors in the run.
    #[must_use]
    pub const fn actor_count(&self) -> usize {
        self.actor_count
    }

    /// Run namespace the client votes in.
    #[must_use]
    pub const fn run(&self) -> &RunId {
        &self.run
    }

    /// Submits `value` as this participant's vote for `sync_id`, replacing any
    /// earlier vote.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Transport`] when the service is unreachable.
    pub async fn vote(&self, sync_id: &SyncId, value: Value) -> Result<(), BarrierError> {
        debug!(
            run = %self.run,
            sync_id = %sync_id,
            participant = self.participant,
            "voting"
        );
        self.transport
            .submit_vote(&self.run, sync_id, self.participant, &value)
            .await
    }

    /// Fetches the current votes for `sync_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Transport`] when the service is unreachable.
    pub async fn votes(&self, sync_id: &SyncId) -> Result<Votes, BarrierError> {
        self.transport.fetch_votes(&self.run, sync_id).await
    }

    /// Votes and polls `sync_id` until `validator` accepts the vote map.
    ///
    /// Every iteration calls `vote_fn`; `None` abstains for that iteration and
    /// submits nothing. The vote map handed to `validator` is fetched after
    /// this participant's vote was stored. Transport failures are retried at
    /// the poll cadence until the deadline (`timeout`, or the client default)
    /// elapses; a poll still in flight at the deadline is abandoned. Returns
    /// the vote map that satisfied the validator.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Timeout`] when the deadline elapses, or any
    /// non-transient error immediately.
    pub async fn wait<V, F>(
        &self,
        sync_id: &SyncId,
        mut validator: V,
        mut vote_fn: F,
        timeout: Option<Duration>,
    ) -> Result<Votes, BarrierError>
    where
        V: FnMut(&Votes) -> bool + Send,
        F: FnMut() -> Option<Value> + Send,
    {
        let limit = timeout.or(self.default_timeout);
        let deadline = limit.map(|waited| (Instant::now() + waited, waited));
        let mut last_error = None;

        loop {
            let polled = match deadline {
                Some((expires_at, _)) => {
                    let remaining = expires_at.saturating_duration_since(Instant::now());
                    let poll = self.poll_once(sync_id, &mut validator, &mut vote_fn);
                    tokio::time::timeout(remaining, poll)
                        .await
                        .unwrap_or_else(|_| {
                            Err(BarrierError::Transport {
                                message: String::from("poll cut short by the wait deadline"),
                            })
                        })
                }
                None => self.poll_once(sync_id, &mut validator, &mut vote_fn).await,
            };
            match polled {
                Ok(Some(votes)) => return Ok(votes),
                Ok(None) => last_error = None,
                Err(err) if err.is_transient() => {
                    warn!(
                        run = %self.run,
                        sync_id = %sync_id,
                        error = %err,
                        "barrier poll failed; retrying"
                    );
                    last_error = Some(err.to_string());
                }
                Err(err) => return Err(err),
            }

            if let Some((expires_at, waited)) = deadline
                && Instant::now() >= expires_at
            {
                return Err(BarrierError::Timeout {
                    sync_id: sync_id.clone(),
                    waited,
                    last_error,
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Waits until every participant in `participants` (default: every actor)
    /// voted the [`ARRIVED`] marker for `sync_id`.
    ///
    /// This participant votes only when it belongs to the expected set, so a
    /// bystander may wait on a subset without being counted.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::UnknownParticipant`] for indices outside the
    /// run, or the errors of [`BarrierClient::wait`].
    pub async fn sync(
        &self,
        sync_id: &SyncId,
        participants: Option<&[ParticipantId]>,
        timeout: Option<Duration>,
    ) -> Result<(), BarrierError> {
        let expected: Vec<ParticipantId> =
            participants.map_or_else(|| (0..self.actor_count).collect(), <[_]>::to_vec);
        if let Some(&participant) = expected.iter().find(|p| **p >= self.actor_count) {
            return Err(BarrierError::UnknownParticipant {
                participant,
                actor_count: self.actor_count,
            });
        }

        let marker = Value::from(ARRIVED);
        let voting = expected.contains(&self.participant);
        self.wait(
            sync_id,
            |votes| all_voted(votes, &expected, &marker),
            || voting.then(|| marker.clone()),
            timeout,
        )
        .await
        .map(drop)
    }

    /// Drops every sync point of this run from the service.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Transport`] when the service is unreachable.
    pub async fn teardown(&self) -> Result<(), BarrierError> {
        self.transport.teardown(&self.run).await
    }

    async fn poll_once<V, F>(
        &self,
        sync_id: &SyncId,
        validator: &mut V,
        vote_fn: &mut F,
    ) -> Result<Option<Votes>, BarrierError>
    where
        V: FnMut(&Votes) -> bool + Send,
        F: FnMut() -> Option<Value> + Send,
    {
        if let Some(value) = vote_fn() {
            self.vote(sync_id, value).await?;
        }
        let votes = self.votes(sync_id).await?;
        Ok(validator(&votes).then_some(votes))
    }
}
