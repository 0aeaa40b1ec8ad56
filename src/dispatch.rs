//! Role assignment for test-case specs.
//!
//! A [`TestSpec`] lists entry functions by position plus an optional default.
//! Actor `i` runs `entries[i]` when it exists and the default otherwise, so
//! every actor works out its role from its own index without talking to
//! anybody. [`lucky_actor`] picks one distinguished actor from a seed every
//! actor already shares.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::context::CaseError;

/// Future produced by a test-case entry.
pub type EntryFuture = Pin<Box<dyn Future<Output = Result<(), CaseError>> + Send>>;

/// Zero-argument test-case function.
pub type Entry = Box<dyn Fn() -> EntryFuture + Send + Sync>;

/// Wraps an async closure as an [`Entry`].
#[must_use]
pub fn entry<F, Fut>(function: F) -> Entry
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CaseError>> + Send + 'static,
{
    Box::new(move || Box::pin(function()))
}

/// What a given actor runs for a spec.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Assignment {
    /// The entry at this position.
    Entry(usize),
    /// The spec's default function.
    Default,
    /// Nothing: the actor outnumbers the entries and the spec has no default.
    Idle,
}

/// Declarative description of a multi-actor test case.
#[derive(Default)]
pub struct TestSpec {
    entries: Vec<Entry>,
    default: Option<Entry>,
}

impl fmt::Debug for TestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSpec")
            .field("entries", &self.entries.len())
            .field("default", &self.default.is_some())
            .finish()
    }
}

impl TestSpec {
    /// Creates a spec with no entries and no default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry; its position is the actor index that runs it.
    #[must_use]
    pub fn with_entry(mut self, function: Entry) -> Self {
        self.entries.push(function);
        self
    }

    /// Sets the function run by actors without a positional entry.
    #[must_use]
    pub fn with_default(mut self, function: Entry) -> Self {
        self.default = Some(function);
        self
    }

    /// Number of positional entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Works out what actor `index` runs.
    #[must_use]
    pub fn assignment(&self, index: usize) -> Assignment {
        if index < self.entries.len() {
            Assignment::Entry(index)
        } else if self.default.is_some() {
            Assignment::Default
        } else {
            Assignment::Idle
        }
    }

    /// Runs the single function assigned to actor `index`.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by the test-case function.
    pub async fn run(&self, index: usize) -> Result<Assignment, CaseError> {
        let assignment = self.assignment(index);
        let function = match assignment {
            Assignment::Entry(position) => self.entries.get(position),
            Assignment::Default => self.default.as_ref(),
            Assignment::Idle => None,
        };
        info!(actor = index, ?assignment, "dispatching test case");
        if let Some(function) = function {
            function().await?;
        }
        Ok(assignment)
    }
}

/// Picks the lucky actor for `seed` among `actor_count` actors.
///
/// The seed is hashed with SHA-256 and the first eight digest bytes are folded
/// into an integer reduced modulo `actor_count`. Every actor computing this
/// from the same seed agrees on the result. Returns `None` when there are no
/// actors.
#[must_use]
pub fn lucky_actor(seed: &str, actor_count: usize) -> Option<usize> {
    let digest = Sha256::digest(seed.as_bytes());
    let folded = digest
        .iter()
        .take(8)
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte));
    let count = u64::try_from(actor_count).ok()?;
    let index = folded.checked_rem(count)?;
    usize::try_from(index).ok()
}
