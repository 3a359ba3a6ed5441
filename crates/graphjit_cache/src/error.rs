use std::io;
use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Status of a cache or compiler operation.
///
/// `Clone` because a failed compilation is stored in its cache entry and handed to
/// every later caller of the same signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("internal: {0}")]
    Internal(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("data loss: {0}")]
    DataLoss(String),

    #[error("i/o error on {path}: {message}")]
    Io { path: String, message: String },
}

impl CompileError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::Unimplemented(message.into())
    }

    pub fn io(path: &Path, err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            return Self::NotFound(path.display().to_string());
        }
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let status = CompileError::io(Path::new("/tmp/x.pb"), &err);
        assert!(status.is_not_found());

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let status = CompileError::io(Path::new("/tmp/x.pb"), &err);
        assert!(matches!(status, CompileError::Io { .. }));
        assert_eq!(status.to_string(), "i/o error on /tmp/x.pb: nope");
    }
}
