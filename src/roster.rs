//! Actor roster loaded from YAML.
//!
//! The roster enumerates every actor of a run in index order:
//!
//! ```yaml
//! actors:
//!   - address: 10.0.0.11
//!     login: tester
//!     root: /home/tester/syncdet
//!   - address: 10.0.0.12
//!     login: Administrator
//!     root: 'C:\syncdet'
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use thiserror::Error;

/// One actor of the run. Immutable for the run's lifetime.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Actor {
    /// Stable zero-based index, the actor's position in the roster.
    pub index: usize,
    /// Network address the actor is reachable on.
    pub address: String,
    /// Login used to reach the actor.
    pub login: String,
    /// Root directory of the actor's test area, in the actor's own OS format.
    pub root: Option<Utf8PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RosterFile {
    actors: Vec<ActorEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActorEntry {
    address: String,
    login: String,
    #[serde(default)]
    root: Option<Utf8PathBuf>,
}

/// Errors raised while loading a roster.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RosterError {
    /// Raised when the roster file cannot be read.
    #[error("failed to read roster {path}: {message}")]
    Io {
        /// Roster path.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the roster is not valid YAML of the expected shape.
    #[error("failed to parse roster: {0}")]
    Parse(String),
    /// Raised when the roster lists no actors.
    #[error("roster lists no actors")]
    Empty,
    /// Raised when an actor entry has a blank field.
    #[error("actor {index} has an empty {field}")]
    BlankField {
        /// Index of the offending actor.
        index: usize,
        /// Name of the blank field.
        field: &'static str,
    },
}

/// Ordered, non-empty list of actors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActorRoster {
    actors: Vec<Actor>,
}

impl ActorRoster {
    /// Builds a roster from actors listed in index order.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Empty`] when `entries` is empty and
    /// [`RosterError::BlankField`] when an address or login is blank.
    pub fn from_entries<I>(entries: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = (String, String, Option<Utf8PathBuf>)>,
    {
        let actors = entries
            .into_iter()
            .enumerate()
            .map(|(index, (address, login, root))| {
                if address.trim().is_empty() {
                    return Err(RosterError::BlankField {
                        index,
                        field: "address",
                    });
                }
                if login.trim().is_empty() {
                    return Err(RosterError::BlankField {
                        index,
                        field: "login",
                    });
                }
                Ok(Actor {
                    index,
                    address,
                    login,
                    root,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if actors.is_empty() {
            return Err(RosterError::Empty);
        }
        Ok(Self { actors })
    }

    /// Parses a roster from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Parse`] for malformed YAML and the validation
    /// errors of [`ActorRoster::from_entries`].
    pub fn from_yaml_str(contents: &str) -> Result<Self, RosterError> {
        let file: RosterFile =
            serde_yaml::from_str(contents).map_err(|err| RosterError::Parse(err.to_string()))?;
        Self::from_entries(
            file.actors
                .into_iter()
                .map(|entry| (entry.address, entry.login, entry.root)),
        )
    }

    /// Reads and parses the roster at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Io`] when the file cannot be read, plus the
    /// errors of [`ActorRoster::from_yaml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self, RosterError> {
        let contents = read_roster(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Number of actors in the run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Always `false`: a roster holds at least one actor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Actor at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Actor> {
        self.actors.get(index)
    }

    /// Iterates the actors in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }
}

fn read_roster(path: &Utf8Path) -> Result<String, RosterError> {
    let io_error = |err: std::io::Error| RosterError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| RosterError::Io {
        path: path.to_path_buf(),
        message: String::from("roster path is missing a file name"),
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(io_error)?;
    dir.read_to_string(file_name).map_err(io_error)
}
