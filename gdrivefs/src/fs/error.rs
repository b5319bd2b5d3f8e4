use thiserror::Error;

use super::index::IndexError;
use super::paths::PathError;
use super::remote::RemoteError;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("resource is of the wrong kind for this operation: {0}")]
    ResourceInvalid(String),
    #[error("parent directory is missing: {0}")]
    ParentDirectoryMissing(String),
    #[error("destination exists: {0}")]
    DestinationExists(String),
    #[error("directory is not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("the root directory cannot be removed")]
    RemoveRoot,
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("backend error: {0}")]
    Backend(#[from] RemoteError),
}

/// Fieldless view of [`FsError`] for callers that only branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceNotFound,
    ResourceInvalid,
    ParentDirectoryMissing,
    DestinationExists,
    DirectoryNotEmpty,
    RemoveRoot,
    InvalidPath,
    InvalidArgument,
    Backend,
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            FsError::ResourceInvalid(_) => ErrorKind::ResourceInvalid,
            FsError::ParentDirectoryMissing(_) => ErrorKind::ParentDirectoryMissing,
            FsError::DestinationExists(_) => ErrorKind::DestinationExists,
            FsError::DirectoryNotEmpty(_) => ErrorKind::DirectoryNotEmpty,
            FsError::RemoveRoot => ErrorKind::RemoveRoot,
            FsError::InvalidPath(_) => ErrorKind::InvalidPath,
            FsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FsError::Backend(_) => ErrorKind::Backend,
        }
    }
}

impl From<IndexError> for FsError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotIndexed(path) => FsError::ResourceNotFound(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_indexed_becomes_not_found() {
        let err: FsError = IndexError::NotIndexed("/a".into()).into();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
        assert_eq!(err.to_string(), "resource not found: /a");
    }

    #[test]
    fn backend_errors_keep_their_source() {
        let err: FsError = RemoteError::NotFound("id-1".into()).into();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains("id-1"));
    }
}
