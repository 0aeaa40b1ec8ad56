//! Polling helpers that wait for a physical tree to take an expected shape.

use std::time::{Duration, Instant};

use camino::Utf8Path;
use tokio::time::sleep;
use tracing::{debug, info};

use super::{DirTree, DirTreeError};

/// Default interval between two scans.
pub const DEFAULT_TREE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default time allowed for a tree to converge.
pub const DEFAULT_TREE_TIMEOUT: Duration = Duration::from_secs(60);

/// Cadence and deadline for tree polling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollOptions {
    /// Interval between two scans.
    pub interval: Duration,
    /// Time after which polling fails with [`DirTreeError::Timeout`].
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TREE_POLL_INTERVAL,
            timeout: DEFAULT_TREE_TIMEOUT,
        }
    }
}

enum PollState {
    Polling,
    Satisfied(usize),
    Failed(DirTreeError),
}

/// Polls `path` until it represents one of `trees`, returning the index of the
/// first tree that matched.
///
/// # Errors
///
/// Returns [`DirTreeError::NoCandidates`] when `trees` is empty,
/// [`DirTreeError::Timeout`] when nothing matched in time, and scan errors as
/// they occur.
pub async fn wait_for_any(
    path: &Utf8Path,
    trees: &[DirTree],
    options: PollOptions,
) -> Result<usize, DirTreeError> {
    if trees.is_empty() {
        return Err(DirTreeError::NoCandidates);
    }
    poll(path, options, || first_match(path, trees)).await
}

/// Like [`wait_for_any`], but fails as soon as `path` represents `rejected`.
///
/// The rejected shape is checked before the accepted ones on every scan.
///
/// # Errors
///
/// Returns [`DirTreeError::RejectedShape`] when the rejected tree is observed,
/// plus the errors of [`wait_for_any`].
pub async fn wait_for_any_but(
    path: &Utf8Path,
    rejected: &DirTree,
    accepted: &[DirTree],
    options: PollOptions,
) -> Result<usize, DirTreeError> {
    if accepted.is_empty() {
        return Err(DirTreeError::NoCandidates);
    }
    poll(path, options, || {
        if rejected.represents(path)? {
            return Ok(PollState::Failed(DirTreeError::RejectedShape {
                path: path.to_string(),
                tree: rejected.name().to_owned(),
            }));
        }
        first_match(path, accepted)
    })
    .await
}

fn first_match(path: &Utf8Path, trees: &[DirTree]) -> Result<PollState, DirTreeError> {
    for (index, tree) in trees.iter().enumerate() {
        if tree.represents(path)? {
            return Ok(PollState::Satisfied(index));
        }
    }
    Ok(PollState::Polling)
}

async fn poll<F>(path: &Utf8Path, options: PollOptions, mut step: F) -> Result<usize, DirTreeError>
where
    F: FnMut() -> Result<PollState, DirTreeError>,
{
    let expires_at = Instant::now() + options.timeout;
    loop {
        match step()? {
            PollState::Satisfied(index) => {
                info!(path = %path, index, "tree converged");
                return Ok(index);
            }
            PollState::Failed(err) => return Err(err),
            PollState::Polling => debug!(path = %path, "tree not converged yet"),
        }
        if Instant::now() >= expires_at {
            return Err(DirTreeError::Timeout {
                path: path.to_string(),
                waited: options.timeout,
            });
        }
        sleep(options.interval).await;
    }
}
