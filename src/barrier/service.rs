//! Reference barrier service.
//!
//! Serves the barrier wire contract over HTTP from a [`MemoryBarrier`]:
//!
//! - `PUT /runs/{run}/sync/{sync_id}/votes/{participant}` stores a JSON vote
//! - `GET /runs/{run}/sync/{sync_id}/votes` returns `{ "<participant>": vote }`
//! - `DELETE /runs/{run}` drops the run namespace
//! - `GET /health` answers once the service is listening

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, put};
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::transport::BarrierTransport;
use super::{BarrierError, MemoryBarrier, ParticipantId, RunId, SyncId, Votes};

/// Default address the service binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port the service binds to.
pub const DEFAULT_PORT: u16 = 8734;

/// Listening address for [`serve`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceConfig {
    /// Host or IP to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

/// Errors raised while running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Raised when the listener cannot be bound or the server fails.
    #[error("barrier service failed on {address}: {source}")]
    Io {
        /// Address the service tried to use.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(BarrierError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            BarrierError::InvalidRunId
            | BarrierError::UnknownParticipant { .. }
            | BarrierError::Rejected { .. } => StatusCode::BAD_REQUEST,
            BarrierError::Transport { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BarrierError::Timeout { .. }
            | BarrierError::InvalidResponse { .. }
            | BarrierError::InvalidEndpoint { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<BarrierError> for ApiError {
    fn from(value: BarrierError) -> Self {
        Self(value)
    }
}

/// Builds the router serving the barrier contract from `store`.
#[must_use]
pub fn build_router(store: MemoryBarrier) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/runs/:run", delete(teardown_run))
        .route("/runs/:run/sync/:sync_id/votes", get(fetch_votes))
        .route(
            "/runs/:run/sync/:sync_id/votes/:participant",
            put(submit_vote),
        )
        .with_state(store)
}

/// Binds `config` and serves the barrier contract until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns [`ServiceError::Io`] when binding or serving fails.
pub async fn serve(config: &ServiceConfig, store: MemoryBarrier) -> Result<(), ServiceError> {
    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| ServiceError::Io {
            address: address.clone(),
            source,
        })?;
    info!(address = %address, "barrier service listening");
    axum::serve(listener, build_router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| ServiceError::Io {
            address: address.clone(),
            source,
        })?;
    info!("barrier service shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[expect(clippy::unused_async, reason = "axum handlers are async functions")]
async fn health() -> &'static str {
    "ok"
}

async fn submit_vote(
    State(store): State<MemoryBarrier>,
    Path((raw_run, raw_sync_id, participant)): Path<(String, String, ParticipantId)>,
    Json(value): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let run = RunId::new(raw_run)?;
    let sync_id = SyncId::from(raw_sync_id);
    debug!(run = %run, sync_id = %sync_id, participant, "vote received");
    store
        .submit_vote(&run, &sync_id, participant, &value)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_votes(
    State(store): State<MemoryBarrier>,
    Path((raw_run, sync_id)): Path<(String, String)>,
) -> Result<Json<Votes>, ApiError> {
    let run = RunId::new(raw_run)?;
    let votes = store.fetch_votes(&run, &SyncId::from(sync_id)).await?;
    Ok(Json(votes))
}

async fn teardown_run(
    State(store): State<MemoryBarrier>,
    Path(raw_run): Path<String>,
) -> Result<StatusCode, ApiError> {
    let run = RunId::new(raw_run)?;
    store.teardown(&run).await?;
    info!(run = %run, "run namespace torn down");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router
            .oneshot(request)
            .await
            .unwrap_or_else(|err| match err {});
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, body)
    }

    fn put_vote(path: &str, vote: &Value) -> Request<Body> {
        Request::put(path)
            .header("content-type", "application/json")
            .body(Body::from(vote.to_string()))
            .expect("request should build")
    }

    #[tokio::test]
    async fn votes_are_upserted_per_participant() {
        let store = MemoryBarrier::new();
        let router = build_router(store.clone());

        let (status, _) = send(
            router.clone(),
            put_vote("/runs/r1/sync/start/votes/0", &Value::from("a")),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        send(
            router.clone(),
            put_vote("/runs/r1/sync/start/votes/0", &Value::from("b")),
        )
        .await;
        send(
            router.clone(),
            put_vote("/runs/r1/sync/start/votes/2", &Value::Null),
        )
        .await;

        let request = Request::get("/runs/r1/sync/start/votes")
            .body(Body::empty())
            .expect("request should build");
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "0": "b", "2": null }));
    }

    #[tokio::test]
    async fn unknown_sync_point_is_an_empty_map() {
        let router = build_router(MemoryBarrier::new());
        let request = Request::get("/runs/r1/sync/never/votes")
            .body(Body::empty())
            .expect("request should build");
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({}));
    }

    #[tokio::test]
    async fn teardown_drops_the_run_namespace() {
        let store = MemoryBarrier::new();
        let router = build_router(store.clone());
        send(
            router.clone(),
            put_vote("/runs/r1/sync/start/votes/1", &Value::from(true)),
        )
        .await;
        assert_eq!(store.run_count().await, 1);

        let request = Request::delete("/runs/r1")
            .body(Body::empty())
            .expect("request should build");
        let (status, _) = send(router, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(store.run_count().await, 0);
    }

    #[tokio::test]
    async fn unreachable_store_maps_to_service_unavailable() {
        let store = MemoryBarrier::new();
        store.set_reachable(false);
        let request = Request::get("/runs/r1/sync/start/votes")
            .body(Body::empty())
            .expect("request should build");
        let (status, body) = send(build_router(store), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().is_some_and(|msg| msg.contains("unavailable")));
    }
}
