//! Framed SHA-256 hashing shared by expected and physical trees.
//!
//! Every record is a one-byte tag followed by length-prefixed fields
//! (`<decimal length>:<bytes>`), so no two distinct trees can produce the same
//! byte stream. Callers feed records in sorted name order.

use std::fmt;

use sha2::{Digest, Sha256};

const DIR_TAG: u8 = b'D';
const FILE_TAG: u8 = b'F';
const CONTENT_TAG: u8 = b'C';
const IGNORED_TAG: u8 = b'I';
const OTHER_TAG: u8 = b'O';

/// SHA-256 digest identifying a tree shape.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct TreeDigest([u8; 32]);

impl TreeDigest {
    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TreeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TreeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeDigest({self})")
    }
}

#[derive(Default)]
pub(super) struct TreeHasher {
    inner: Sha256,
}

impl TreeHasher {
    pub(super) fn dir(&mut self, path: &str) {
        self.inner.update([DIR_TAG]);
        self.field(path.as_bytes());
    }

    /// Records a file; `content` is `None` when the name is in the ignore set.
    pub(super) fn file(&mut self, path: &str, content: Option<&[u8]>) {
        self.inner.update([FILE_TAG]);
        self.field(path.as_bytes());
        match content {
            Some(bytes) => {
                self.inner.update([CONTENT_TAG]);
                self.field(bytes);
            }
            None => self.inner.update([IGNORED_TAG]),
        }
    }

    /// Records an entry that is neither a regular file nor a directory.
    pub(super) fn other(&mut self, path: &str) {
        self.inner.update([OTHER_TAG]);
        self.field(path.as_bytes());
    }

    pub(super) fn finish(self) -> TreeDigest {
        TreeDigest(self.inner.finalize().into())
    }

    fn field(&mut self, bytes: &[u8]) {
        self.inner.update(bytes.len().to_string().as_bytes());
        self.inner.update(b":");
        self.inner.update(bytes);
    }
}

pub(super) fn child_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}
