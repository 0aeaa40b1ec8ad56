//! Request/reply client for the file-sync daemon.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::frame::{read_frame, write_frame};
use super::{ObjectAttributes, ObjectKind, RemoteErrorKind, RitualError, SubjectPermissions};
use crate::retry::RetryTimer;

#[derive(Debug, Serialize)]
struct RitualRequest<'a> {
    id: u64,
    method: &'a str,
    body: Value,
}

#[derive(Debug, Deserialize)]
struct RitualReply {
    id: u64,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    exception: Option<RemoteException>,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
    code: String,
    #[serde(default)]
    message: String,
}

/// Ritual client over any ordered byte stream.
#[derive(Debug)]
pub struct RitualClient<S> {
    stream: S,
    next_id: u64,
}

impl RitualClient<TcpStream> {
    /// Connects to the daemon at `address`, retrying refused connections with
    /// the delays produced by `timer` until `deadline` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`RitualError::Timeout`] carrying the last connection error.
    pub async fn connect_with_retry(
        address: &str,
        mut timer: RetryTimer,
        deadline: Duration,
    ) -> Result<Self, RitualError> {
        let give_up_at = Instant::now() + deadline;
        loop {
            let err = match TcpStream::connect(address).await {
                Ok(stream) => {
                    debug!(address, "connected to ritual endpoint");
                    return Ok(Self::new(stream));
                }
                Err(err) => err,
            };
            let delay = timer.next_time();
            if Instant::now() + delay > give_up_at {
                return Err(RitualError::Timeout {
                    operation: "connect",
                    waited: deadline,
                    last_error: err.to_string(),
                });
            }
            warn!(address, error = %err, retry_in = ?delay, "ritual endpoint not reachable");
            sleep(delay).await;
        }
    }
}

impl<S> RitualClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an established stream.
    #[must_use]
    pub const fn new(stream: S) -> Self {
        Self { stream, next_id: 1 }
    }

    /// Returns the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Sends `method` with `body` and waits for the matching reply body.
    ///
    /// # Errors
    ///
    /// Returns [`RitualError::Remote`] when the daemon raises an exception,
    /// [`RitualError::Protocol`] for malformed or mismatched replies, and
    /// transport errors as they occur.
    pub async fn call(&mut self, method: &str, body: Value) -> Result<Value, RitualError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let request = serde_json::to_vec(&RitualRequest { id, method, body }).map_err(|err| {
            RitualError::Protocol {
                message: err.to_string(),
            }
        })?;
        debug!(method, id, "ritual call");
        write_frame(&mut self.stream, &request).await?;

        let frame = read_frame(&mut self.stream).await?;
        let reply: RitualReply =
            serde_json::from_slice(&frame).map_err(|err| RitualError::Protocol {
                message: format!("undecodable reply to {method}: {err}"),
            })?;
        if reply.id != id {
            return Err(RitualError::Protocol {
                message: format!("reply id {} does not match request id {id}", reply.id),
            });
        }
        if let Some(exception) = reply.exception {
            let kind = RemoteErrorKind::from_code(&exception.code).ok_or_else(|| {
                RitualError::Protocol {
                    message: format!("unknown exception code {}", exception.code),
                }
            })?;
            return Err(RitualError::Remote {
                kind,
                message: exception.message,
            });
        }
        Ok(reply.body)
    }

    /// Fetches the attributes of the object at `path`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RitualClient::call`].
    pub async fn get_object_attributes(
        &mut self,
        path: &str,
    ) -> Result<ObjectAttributes, RitualError> {
        let body = self
            .call("get_object_attributes", json!({ "path": path }))
            .await?;
        decode(body)
    }

    /// Creates an object of `kind` at `path`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RitualClient::call`].
    pub async fn create_object(&mut self, path: &str, kind: ObjectKind) -> Result<(), RitualError> {
        self.call("create_object", json!({ "path": path, "kind": kind }))
            .await
            .map(drop)
    }

    /// Shares the folder at `path` with `subjects`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RitualClient::call`].
    pub async fn share_folder(
        &mut self,
        path: &str,
        subjects: &[SubjectPermissions],
    ) -> Result<(), RitualError> {
        self.call("share_folder", json!({ "path": path, "subjects": subjects }))
            .await
            .map(drop)
    }

    /// Polls the attributes of `path` until the daemon knows the object.
    ///
    /// `NOT_FOUND` and `INDEXING` exceptions keep the poll going; any other
    /// error is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`RitualError::Timeout`] when the object did not appear within
    /// `timeout`.
    pub async fn wait_for_attributes(
        &mut self,
        path: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<ObjectAttributes, RitualError> {
        let expires_at = Instant::now() + timeout;
        loop {
            let err = match self.get_object_attributes(path).await {
                Ok(attributes) => return Ok(attributes),
                Err(err) => err,
            };
            let retryable = err.remote_kind().is_some_and(RemoteErrorKind::keeps_polling);
            if !retryable {
                return Err(err);
            }
            if Instant::now() >= expires_at {
                return Err(RitualError::Timeout {
                    operation: "get_object_attributes",
                    waited: timeout,
                    last_error: err.to_string(),
                });
            }
            debug!(path, error = %err, "object not available yet");
            sleep(interval).await;
        }
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, RitualError> {
    serde_json::from_value(body).map_err(|err| RitualError::Protocol {
        message: err.to_string(),
    })
}
