//! Error types for the artifact store

use crate::name::NameError;
use std::path::PathBuf;

/// Errors raised by [`ArtifactStore`](crate::ArtifactStore)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Name rejected before touching the filesystem
    #[error("invalid artifact name: {0}")]
    InvalidName(#[from] NameError),

    /// No committed artifact under that name
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Filesystem failure
    #[error("io error at {path}: {source}")]
    Io {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the caller asked for something unusable (bad or unknown name)
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidName(_) | Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_name_display() {
        let err: StoreError = NameError::ParentReference.into();
        assert_eq!(
            err.to_string(),
            "invalid artifact name: name contains a parent reference"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn io_error_is_not_client_error() {
        let err = StoreError::io_error(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().starts_with("io error at /tmp/x"));
        assert!(!err.is_client_error());
    }
}
