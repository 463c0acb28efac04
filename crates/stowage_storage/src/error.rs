//! Error types for storage operations.
//!
//! Every backend classifies its native failures into [`StorageError`] before
//! returning. Callers branch on [`StorageError::kind`] rather than on the
//! shape of the underlying I/O or client error.

use crate::client::ClientError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed source error retained for diagnostics.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The coarse classification every storage error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The named file, folder, bucket or container does not exist.
    NotFound,
    /// The target already exists.
    Conflict,
    /// The medium refused access.
    PermissionDenied,
    /// A name tried to escape the storage root.
    SecurityViolation,
    /// The caller passed something the operation cannot accept.
    InvalidArgument,
    /// The backend could not be reached or was not configured.
    Unavailable,
    /// No free name could be found.
    ResourceExhausted,
    /// Anything else; the original error is kept as the source.
    Failure,
}

impl ErrorKind {
    /// HTTP-style status code for this kind.
    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::SecurityViolation => 400,
            ErrorKind::InvalidArgument => 400,
            ErrorKind::Unavailable => 503,
            ErrorKind::ResourceExhausted => 507,
            ErrorKind::Failure => 500,
        }
    }

    /// Stable lowercase label, used in log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::SecurityViolation => "security_violation",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Failure => "failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The named entry does not exist.
    #[error("not found: {name}")]
    NotFound {
        /// The logical name, folder or bucket that was looked up.
        name: String,
    },

    /// The entry already exists.
    #[error("already exists: {name}")]
    Conflict {
        /// The logical name, folder or bucket that collided.
        name: String,
    },

    /// Access to the entry was refused by the medium.
    #[error("permission denied: {name}: {message}")]
    PermissionDenied {
        /// The name being accessed.
        name: String,
        /// Backend message.
        message: String,
    },

    /// The resolved name would land outside the storage root.
    #[error("path escapes storage root: {name}")]
    SecurityViolation {
        /// The offending name as requested.
        name: String,
    },

    /// A name was assigned to a file handle that already has one.
    #[error("file is already named {current}; use rename instead")]
    RenameViolation {
        /// The name the handle is bound to.
        current: String,
    },

    /// Invalid input to an operation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The backend is missing, misconfigured or unreachable.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Description of the problem.
        message: String,
    },

    /// Collision avoidance gave up.
    #[error("no free name for {name} after {attempts} attempts")]
    ResourceExhausted {
        /// The name that kept colliding.
        name: String,
        /// Number of suffixed candidates tried.
        attempts: u32,
    },

    /// Unclassified backend failure.
    #[error("storage failure: {message}")]
    Failure {
        /// Description of what was attempted.
        message: String,
        /// The native error.
        #[source]
        source: Option<BoxedSource>,
    },
}

impl StorageError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Conflict { .. } => ErrorKind::Conflict,
            StorageError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            StorageError::SecurityViolation { .. } => ErrorKind::SecurityViolation,
            StorageError::RenameViolation { .. } | StorageError::InvalidArgument { .. } => {
                ErrorKind::InvalidArgument
            }
            StorageError::Unavailable { .. } => ErrorKind::Unavailable,
            StorageError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            StorageError::Failure { .. } => ErrorKind::Failure,
        }
    }

    /// HTTP-style status code of this error's kind.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a conflict error.
    pub fn conflict(name: impl Into<String>) -> Self {
        Self::Conflict { name: name.into() }
    }

    /// Creates a confinement error.
    pub fn security_violation(name: impl Into<String>) -> Self {
        Self::SecurityViolation { name: name.into() }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a catch-all failure wrapping a native error.
    pub fn failure(
        message: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Failure {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Classifies an OS error raised while operating on `name`.
    pub fn from_io(err: io::Error, name: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(name),
            io::ErrorKind::AlreadyExists => Self::conflict(name),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                name: name.to_string(),
                message: err.to_string(),
            },
            io::ErrorKind::InvalidInput => {
                Self::invalid_argument(format!("{name}: {err}"))
            }
            _ => Self::failure(format!("I/O on {name}"), err),
        }
    }

    /// Classifies a collaborator client error raised while operating on `name`.
    pub fn from_client(err: ClientError, name: &str) -> Self {
        match err.status {
            Some(404) => Self::not_found(name),
            Some(409) => Self::conflict(name),
            Some(401) | Some(403) => Self::PermissionDenied {
                name: name.to_string(),
                message: err.message,
            },
            Some(400) => Self::invalid_argument(format!("{name}: {}", err.message)),
            Some(503) | None => Self::unavailable(format!("{name}: {err}")),
            Some(_) => Self::failure(format!("backend request on {name}"), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_status_codes() {
        assert_eq!(StorageError::not_found("a").status_code(), 404);
        assert_eq!(StorageError::conflict("a").status_code(), 409);
        assert_eq!(StorageError::security_violation("..").status_code(), 400);
        assert_eq!(StorageError::unavailable("down").status_code(), 503);
    }

    #[test]
    fn rename_violation_is_invalid_argument() {
        let err = StorageError::RenameViolation {
            current: "a.txt".into(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("rename"));
    }

    #[test]
    fn io_errors_are_classified() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(
            StorageError::from_io(not_found, "x").kind(),
            ErrorKind::NotFound
        );

        let exists = io::Error::new(io::ErrorKind::AlreadyExists, "there");
        assert_eq!(StorageError::from_io(exists, "x").kind(), ErrorKind::Conflict);

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        assert_eq!(
            StorageError::from_io(denied, "x").kind(),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn unclassified_io_error_keeps_source() {
        use std::error::Error as _;

        let err = StorageError::from_io(io::Error::new(io::ErrorKind::Other, "disk on fire"), "x");
        assert_eq!(err.kind(), ErrorKind::Failure);
        assert!(err.source().unwrap().to_string().contains("disk on fire"));
    }

    #[test]
    fn client_errors_are_classified() {
        let cases = [
            (Some(404), ErrorKind::NotFound),
            (Some(409), ErrorKind::Conflict),
            (Some(403), ErrorKind::PermissionDenied),
            (Some(400), ErrorKind::InvalidArgument),
            (Some(503), ErrorKind::Unavailable),
            (None, ErrorKind::Unavailable),
            (Some(500), ErrorKind::Failure),
        ];
        for (status, kind) in cases {
            let err = ClientError {
                status,
                code: "Test".into(),
                message: "boom".into(),
            };
            assert_eq!(StorageError::from_client(err, "key").kind(), kind);
        }
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::SecurityViolation.to_string(), "security_violation");
    }
}
