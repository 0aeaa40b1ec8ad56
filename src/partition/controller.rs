//! Partition scope guard.

use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::Arc;

use tracing::{info, warn};

use super::{LinkControl, LinkRegistry, PartitionError, PartitionScope};

/// Active partition. Suspended links are restored by [`NetworkPartition::exit`]
/// or, failing that, when the guard is dropped.
#[must_use = "dropping the partition immediately restores the links"]
pub struct NetworkPartition {
    suspended: Vec<Arc<dyn LinkControl>>,
}

impl fmt::Debug for NetworkPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkPartition")
            .field("suspended", &self.suspended_names())
            .finish()
    }
}

impl NetworkPartition {
    /// Suspends the links selected by `scope`.
    ///
    /// Links are suspended in registration or scope order. When one fails,
    /// the links already suspended are resumed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the resolution errors of the scope and the first suspension
    /// failure.
    pub fn enter(registry: &LinkRegistry, scope: &PartitionScope) -> Result<Self, PartitionError> {
        let targets = registry.resolve(scope)?;
        let mut partition = Self {
            suspended: Vec::with_capacity(targets.len()),
        };
        for link in targets {
            link.suspend()?;
            partition.suspended.push(link);
        }
        info!(links = ?partition.suspended_names(), "network partition entered");
        Ok(partition)
    }

    /// Names of the links this partition suspended.
    #[must_use]
    pub fn suspended_names(&self) -> Vec<&str> {
        self.suspended.iter().map(|link| link.name()).collect()
    }

    /// Resumes every suspended link, most recent first.
    ///
    /// Every link is attempted even when an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first resume failure.
    pub fn exit(mut self) -> Result<(), PartitionError> {
        let result = self.restore();
        info!("network partition exited");
        result
    }

    fn restore(&mut self) -> Result<(), PartitionError> {
        let mut first_error = None;
        for link in mem::take(&mut self.suspended).into_iter().rev() {
            if let Err(err) = link.resume() {
                warn!(link = link.name(), error = %err, "failed to resume link");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for NetworkPartition {
    fn drop(&mut self) {
        if self.suspended.is_empty() {
            return;
        }
        warn!(links = ?self.suspended_names(), "restoring links from dropped partition");
        if let Err(err) = self.restore() {
            warn!(error = %err, "partition restore incomplete");
        }
    }
}

/// Runs `body` inside a partition of `scope`, restoring the links afterwards.
///
/// Links are restored whether `body` succeeds, fails, or panics. A body error
/// takes precedence over a restore error.
///
/// # Errors
///
/// Returns the partition errors converted into `E`, or the body's error.
pub async fn with_partition<F, Fut, T, E>(
    registry: &LinkRegistry,
    scope: &PartitionScope,
    body: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<PartitionError>,
{
    let partition = NetworkPartition::enter(registry, scope)?;
    let outcome = body().await;
    let restored = partition.exit();
    match (outcome, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), restore) => {
            if let Err(restore_err) = restore {
                warn!(error = %restore_err, "partition restore failed after body error");
            }
            Err(err)
        }
    }
}
