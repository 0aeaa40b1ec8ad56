//! Registry of the links known to an actor.

use std::fmt;
use std::sync::Arc;

use super::{Channel, LinkControl, PartitionError, PartitionScope};

/// Named set of links a partition can act on.
#[derive(Clone, Default)]
pub struct LinkRegistry {
    links: Vec<Arc<dyn LinkControl>>,
}

impl fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.links.iter().map(|link| (link.name(), link.channel())))
            .finish()
    }
}

impl LinkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `link` to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::DuplicateLink`] when a link with the same
    /// name is already registered.
    pub fn register(&mut self, link: impl LinkControl + 'static) -> Result<(), PartitionError> {
        if self.get(link.name()).is_some() {
            return Err(PartitionError::DuplicateLink {
                name: link.name().to_owned(),
            });
        }
        self.links.push(Arc::new(link));
        Ok(())
    }

    /// Looks up a link by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn LinkControl>> {
        self.links.iter().find(|link| link.name() == name)
    }

    /// Names of every registered link, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|link| link.name())
    }

    /// Resolves `scope` to the links a partition suspends.
    ///
    /// [`PartitionScope::All`] skips coordination links.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::UnknownLink`] for unregistered names and
    /// [`PartitionError::CoordinationLink`] when a named link carries
    /// coordination traffic.
    pub(super) fn resolve(
        &self,
        scope: &PartitionScope,
    ) -> Result<Vec<Arc<dyn LinkControl>>, PartitionError> {
        match scope {
            PartitionScope::All => Ok(self
                .links
                .iter()
                .filter(|link| link.channel() == Channel::Transport)
                .cloned()
                .collect()),
            PartitionScope::Only(names) => names
                .iter()
                .map(|name| {
                    let link = self.get(name).ok_or_else(|| PartitionError::UnknownLink {
                        name: name.clone(),
                    })?;
                    if link.channel() == Channel::Coordination {
                        return Err(PartitionError::CoordinationLink { name: name.clone() });
                    }
                    Ok(Arc::clone(link))
                })
                .collect(),
        }
    }
}
