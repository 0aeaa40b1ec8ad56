//! Directory-tree comparator used as the final-state oracle of test cases.
//!
//! A [`DirTree`] describes an expected filesystem shape. Its digest folds in
//! every node's path relative to the root and, for files whose name is not in
//! the ignore set, their content. Children are visited in sorted name order so
//! the digest does not depend on construction order. A physical directory is
//! scanned with the same rules and compared by digest, which lets callers poll
//! a live tree that another process is still writing.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::debug;

mod digest;
mod scan;
mod wait;

pub use digest::TreeDigest;
pub use scan::physical_digest;
pub use wait::{
    DEFAULT_TREE_POLL_INTERVAL, DEFAULT_TREE_TIMEOUT, PollOptions, wait_for_any, wait_for_any_but,
};

use digest::{TreeHasher, child_path};

/// Largest file content, in bytes, a tree may describe or a scan may read.
pub const MAX_LEAF_BYTES: usize = 8 * 1024;

/// Errors raised while building, scanning, or waiting on trees.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DirTreeError {
    /// Raised when a node name is empty, `.`, `..`, or contains a separator.
    #[error("invalid tree entry name {name:?}")]
    InvalidName {
        /// Offending name.
        name: String,
    },
    /// Raised when file content exceeds [`MAX_LEAF_BYTES`].
    #[error("leaf {path} holds {size} bytes, above the {MAX_LEAF_BYTES} byte limit")]
    LeafTooLarge {
        /// Path of the leaf relative to the tree root, or on disk for scans.
        path: String,
        /// Content size in bytes.
        size: usize,
    },
    /// Raised when the filesystem fails for reasons other than a vanished
    /// entry.
    #[error("filesystem error at {path}: {message}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when no expected tree matched before the deadline.
    #[error("{path} did not reach an expected shape within {waited:?}")]
    Timeout {
        /// Polled directory.
        path: String,
        /// Time spent polling.
        waited: Duration,
    },
    /// Raised when the polled directory took the rejected shape.
    #[error("{path} took the rejected shape {tree}")]
    RejectedShape {
        /// Polled directory.
        path: String,
        /// Name of the rejected tree.
        tree: String,
    },
    /// Raised when a wait is given no tree to accept.
    #[error("no accepted trees to wait for")]
    NoCandidates,
}

/// A node of an expected tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    /// Regular file with its textual content.
    File(String),
    /// Directory mapping child names to nodes.
    Dir(BTreeMap<String, Node>),
}

impl Node {
    /// Builds a file node.
    #[must_use]
    pub fn file(content: impl Into<String>) -> Self {
        Self::File(content.into())
    }

    /// Builds a directory node. Later duplicates of a name replace earlier ones.
    #[must_use]
    pub fn dir<I, K>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Dir(
            children
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
        )
    }

    /// Builds an empty directory node.
    #[must_use]
    pub const fn empty_dir() -> Self {
        Self::Dir(BTreeMap::new())
    }
}

/// Expected filesystem shape with a precomputed digest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirTree {
    name: String,
    children: BTreeMap<String, Node>,
    ignore_content: BTreeSet<String>,
    digest: TreeDigest,
}

impl DirTree {
    /// Builds a tree labelled `name` from the root's `entries`.
    ///
    /// Files whose base name appears in `ignored` count by presence
    /// only. The label is for diagnostics and does not enter the digest.
    ///
    /// # Errors
    ///
    /// Returns [`DirTreeError::InvalidName`] for unusable entry names and
    /// [`DirTreeError::LeafTooLarge`] for oversized file content.
    pub fn new<I, K, S>(
        name: impl Into<String>,
        entries: I,
        ignored: impl IntoIterator<Item = S>,
    ) -> Result<Self, DirTreeError>
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<String>,
        S: Into<String>,
    {
        let children: BTreeMap<String, Node> = entries
            .into_iter()
            .map(|(child, node)| (child.into(), node))
            .collect();
        validate_children(&children, "")?;
        let ignore_content: BTreeSet<String> = ignored.into_iter().map(Into::into).collect();

        let mut hasher = TreeHasher::default();
        hash_children(&mut hasher, "", &children, &ignore_content);
        Ok(Self {
            name: name.into(),
            children,
            ignore_content,
            digest: hasher.finish(),
        })
    }

    /// Diagnostic label of the tree.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entries directly below the root.
    #[must_use]
    pub const fn children(&self) -> &BTreeMap<String, Node> {
        &self.children
    }

    /// Base names whose content is excluded from the digest.
    #[must_use]
    pub const fn ignore_content(&self) -> &BTreeSet<String> {
        &self.ignore_content
    }

    /// Digest of the expected shape.
    #[must_use]
    pub const fn digest(&self) -> TreeDigest {
        self.digest
    }

    /// Reports whether the directory at `path` currently has this shape.
    ///
    /// A directory that vanishes, or loses an entry, mid-scan does not match
    /// on this attempt.
    ///
    /// # Errors
    ///
    /// Returns the scan errors of [`physical_digest`].
    pub fn represents(&self, path: &Utf8Path) -> Result<bool, DirTreeError> {
        let observed = physical_digest(path, &self.ignore_content)?;
        let matched = observed == Some(self.digest);
        debug!(
            tree = %self.name,
            path = %path,
            expected = %self.digest,
            matched,
            "compared tree"
        );
        Ok(matched)
    }

    /// Writes the tree below `path`, creating `path` if needed.
    ///
    /// Entries already present and absent from the tree are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`DirTreeError::Io`] when a directory or file cannot be
    /// written.
    pub fn materialize(&self, path: &Utf8Path) -> Result<(), DirTreeError> {
        let io_error = |err: std::io::Error| DirTreeError::Io {
            path: path.to_string(),
            message: err.to_string(),
        };
        Dir::create_ambient_dir_all(path, ambient_authority()).map_err(io_error)?;
        let root = Dir::open_ambient_dir(path, ambient_authority()).map_err(io_error)?;
        write_children(&root, path, &self.children)
    }
}

fn validate_children(children: &BTreeMap<String, Node>, prefix: &str) -> Result<(), DirTreeError> {
    for (name, node) in children {
        if !is_valid_name(name) {
            return Err(DirTreeError::InvalidName { name: name.clone() });
        }
        let relative = child_path(prefix, name);
        match node {
            Node::File(content) if content.len() > MAX_LEAF_BYTES => {
                return Err(DirTreeError::LeafTooLarge {
                    path: relative,
                    size: content.len(),
                });
            }
            Node::File(_) => {}
            Node::Dir(grandchildren) => validate_children(grandchildren, &relative)?,
        }
    }
    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn hash_children(
    hasher: &mut TreeHasher,
    prefix: &str,
    children: &BTreeMap<String, Node>,
    ignore_content: &BTreeSet<String>,
) {
    for (name, node) in children {
        let relative = child_path(prefix, name);
        match node {
            Node::File(content) => {
                let recorded = (!ignore_content.contains(name)).then_some(content.as_bytes());
                hasher.file(&relative, recorded);
            }
            Node::Dir(grandchildren) => {
                hasher.dir(&relative);
                hash_children(hasher, &relative, grandchildren, ignore_content);
            }
        }
    }
}

fn write_children(
    dir: &Dir,
    location: &Utf8Path,
    children: &BTreeMap<String, Node>,
) -> Result<(), DirTreeError> {
    for (name, node) in children {
        let target = location.join(name);
        let io_error = |err: std::io::Error| DirTreeError::Io {
            path: target.to_string(),
            message: err.to_string(),
        };
        match node {
            Node::File(content) => dir.write(name, content).map_err(io_error)?,
            Node::Dir(grandchildren) => {
                dir.create_dir_all(name).map_err(io_error)?;
                let child = dir.open_dir(name).map_err(io_error)?;
                write_children(&child, &target, grandchildren)?;
            }
        }
    }
    Ok(())
}
