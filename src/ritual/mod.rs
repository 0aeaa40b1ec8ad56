//! Client for the file-sync daemon's "ritual" RPC interface.
//!
//! Requests and replies travel as length-prefixed frames carrying a JSON
//! envelope. Daemon exceptions decode to [`RitualError::Remote`] with a
//! closed [`RemoteErrorKind`], so callers can match on them exhaustively.

use serde::{Deserialize, Serialize};

mod client;
mod error;
mod frame;

pub use client::RitualClient;
pub use error::{RemoteErrorKind, RitualError};
pub use frame::{MAX_FRAME_BYTES, read_frame, write_frame};

/// Kind of a store object.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Regular file.
    File,
    /// Folder.
    Folder,
    /// Mount point of a shared folder.
    Anchor,
}

/// Attributes the daemon reports for an object.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ObjectAttributes {
    /// Object kind.
    pub kind: ObjectKind,
    /// Stable object identifier.
    pub object_id: String,
    /// Content size in bytes, for files.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Role granted to a sharing subject.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Read and write access.
    Editor,
    /// Full control, including membership.
    Owner,
}

/// Permission granted to one user when sharing a folder.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SubjectPermissions {
    /// User identifier, typically an email address.
    pub subject: String,
    /// Granted role.
    pub role: Role,
}
