//! Ritual error taxonomy.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Exception kinds the daemon reports. Unknown codes are a protocol error.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RemoteErrorKind {
    /// The object does not exist (yet).
    NotFound,
    /// An object already exists at the path.
    AlreadyExists,
    /// The daemon has not finished scanning the path.
    Indexing,
    /// The caller lacks permission.
    NoPermission,
    /// The daemon refused the caller's credentials.
    BadCredential,
    /// A directory was expected.
    NotADirectory,
    /// A file was expected.
    IsADirectory,
    /// The folder is not shared.
    NotShared,
    /// The request arguments were rejected.
    BadArgs,
    /// The daemon is temporarily unable to serve the request.
    Busy,
    /// The daemon failed internally.
    Internal,
}

impl RemoteErrorKind {
    /// Wire code of the kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Indexing => "INDEXING",
            Self::NoPermission => "NO_PERM",
            Self::BadCredential => "BAD_CREDENTIAL",
            Self::NotADirectory => "NOT_DIR",
            Self::IsADirectory => "IS_DIR",
            Self::NotShared => "NOT_SHARED",
            Self::BadArgs => "BAD_ARGS",
            Self::Busy => "BUSY",
            Self::Internal => "INTERNAL",
        }
    }

    /// Parses a wire code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "NOT_FOUND" => Self::NotFound,
            "ALREADY_EXISTS" => Self::AlreadyExists,
            "INDEXING" => Self::Indexing,
            "NO_PERM" => Self::NoPermission,
            "BAD_CREDENTIAL" => Self::BadCredential,
            "NOT_DIR" => Self::NotADirectory,
            "IS_DIR" => Self::IsADirectory,
            "NOT_SHARED" => Self::NotShared,
            "BAD_ARGS" => Self::BadArgs,
            "BUSY" => Self::Busy,
            "INTERNAL" => Self::Internal,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns `true` for kinds that mean "not there yet": an attribute poll
    /// keeps going instead of failing.
    #[must_use]
    pub const fn keeps_polling(self) -> bool {
        match self {
            Self::NotFound | Self::Indexing => true,
            Self::AlreadyExists
            | Self::NoPermission
            | Self::BadCredential
            | Self::NotADirectory
            | Self::IsADirectory
            | Self::NotShared
            | Self::BadArgs
            | Self::Busy
            | Self::Internal => false,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors raised by the ritual client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RitualError {
    /// Raised when the connection fails.
    #[error("ritual transport failed: {message}")]
    Io {
        /// Underlying I/O error message.
        message: String,
    },
    /// Raised when the daemon closed the connection.
    #[error("ritual connection closed by the daemon")]
    Closed,
    /// Raised when a frame exceeds the size limit.
    #[error("ritual frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Announced or actual frame size.
        size: usize,
        /// Largest accepted frame.
        limit: usize,
    },
    /// Raised when a reply cannot be decoded or does not match the request.
    #[error("ritual protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },
    /// Raised when the daemon answered with an exception.
    #[error("ritual call failed with {kind}: {message}")]
    Remote {
        /// Exception kind.
        kind: RemoteErrorKind,
        /// Message supplied by the daemon.
        message: String,
    },
    /// Raised when a retrying operation ran out of time.
    #[error("ritual {operation} did not succeed within {waited:?}: {last_error}")]
    Timeout {
        /// Operation being retried.
        operation: &'static str,
        /// Time spent retrying.
        waited: Duration,
        /// Last error seen before giving up.
        last_error: String,
    },
}

impl RitualError {
    /// Returns the remote kind when this is a daemon exception.
    #[must_use]
    pub const fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            Self::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RitualError {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::UnexpectedEof {
            return Self::Closed;
        }
        Self::Io {
            message: value.to_string(),
        }
    }
}
