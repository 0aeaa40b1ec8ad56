//! HTTP client for the barrier service.

use std::time::{Duration, Instant};

use reqwest::{Client, Response, Url};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::transport::{BarrierFuture, BarrierTransport};
use super::{BarrierError, ParticipantId, RunId, SyncId, Votes};
use crate::retry::RetryTimer;

/// Upper bound for a single request to the barrier service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Barrier transport speaking the service's JSON-over-HTTP contract.
#[derive(Clone, Debug)]
pub struct HttpBarrierTransport {
    client: Client,
    base: Url,
}

impl HttpBarrierTransport {
    /// Creates a transport rooted at `base_url` (for example
    /// `http://barrier.local:8734`).
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::InvalidEndpoint`] when the URL cannot be parsed
    /// or cannot carry a path, and [`BarrierError::Transport`] when the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, BarrierError> {
        let base = Url::parse(base_url.trim()).map_err(|err| BarrierError::InvalidEndpoint {
            url: base_url.to_owned(),
            message: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(BarrierError::InvalidEndpoint {
                url: base_url.to_owned(),
                message: String::from("URL cannot carry a path"),
            });
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport_error)?;
        Ok(Self { client, base })
    }

    /// Polls the service health endpoint until it answers, sleeping between
    /// attempts as dictated by `timer`.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Transport`] carrying the last failure once
    /// `deadline` has elapsed, or [`BarrierError::Rejected`] at once when the
    /// health endpoint answers with a client error.
    pub async fn wait_until_ready(
        &self,
        mut timer: RetryTimer,
        deadline: Duration,
    ) -> Result<(), BarrierError> {
        let url = self.endpoint(&["health"])?;
        let give_up_at = Instant::now() + deadline;
        loop {
            let attempt = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(transport_error)
                .and_then(check_status);
            let err = match attempt {
                Ok(_) => return Ok(()),
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };
            let delay = timer.next_time();
            if Instant::now() + delay > give_up_at {
                return Err(err);
            }
            warn!(url = %url, error = %err, retry_in = ?delay, "barrier service not ready");
            sleep(delay).await;
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BarrierError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| BarrierError::InvalidEndpoint {
                url: self.base.to_string(),
                message: String::from("URL cannot carry a path"),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn votes_endpoint(&self, run: &RunId, sync_id: &SyncId) -> Result<Url, BarrierError> {
        self.endpoint(&["runs", run.as_str(), "sync", sync_id.as_str(), "votes"])
    }
}

impl BarrierTransport for HttpBarrierTransport {
    fn submit_vote<'a>(
        &'a self,
        run: &'a RunId,
        sync_id: &'a SyncId,
        participant: ParticipantId,
        value: &'a Value,
    ) -> BarrierFuture<'a, ()> {
        Box::pin(async move {
            let participant_segment = participant.to_string();
            let url = self.endpoint(&[
                "runs",
                run.as_str(),
                "sync",
                sync_id.as_str(),
                "votes",
                participant_segment.as_str(),
            ])?;
            debug!(url = %url, "submitting vote");
            self.client
                .put(url)
                .json(value)
                .send()
                .await
                .map_err(transport_error)
                .and_then(check_status)?;
            Ok(())
        })
    }

    fn fetch_votes<'a>(&'a self, run: &'a RunId, sync_id: &'a SyncId) -> BarrierFuture<'a, Votes> {
        Box::pin(async move {
            let url = self.votes_endpoint(run, sync_id)?;
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(transport_error)
                .and_then(check_status)?;
            response
                .json::<Votes>()
                .await
                .map_err(|err| BarrierError::InvalidResponse {
                    message: err.to_string(),
                })
        })
    }

    fn teardown<'a>(&'a self, run: &'a RunId) -> BarrierFuture<'a, ()> {
        Box::pin(async move {
            let url = self.endpoint(&["runs", run.as_str()])?;
            self.client
                .delete(url)
                .send()
                .await
                .map_err(transport_error)
                .and_then(check_status)?;
            Ok(())
        })
    }
}

/// Client errors are final; server errors stay retryable.
fn check_status(response: Response) -> Result<Response, BarrierError> {
    let status = response.status();
    if status.is_client_error() {
        return Err(BarrierError::Rejected {
            url: response.url().to_string(),
            status: status.as_u16(),
        });
    }
    response.error_for_status().map_err(transport_error)
}

fn transport_error(err: reqwest::Error) -> BarrierError {
    BarrierError::Transport {
        message: err.to_string(),
    }
}
