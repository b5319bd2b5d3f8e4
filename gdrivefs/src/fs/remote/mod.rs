//! The remote object store contract the filesystem layer is built on.
//!
//! Objects are addressed by opaque id, carry a (non-unique) title and a
//! set of parent ids. Nothing here knows about paths.

mod drive;
mod memory;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

pub use drive::{DEFAULT_PAGE_SIZE, DriveStore};
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("drive api error: {0}")]
    Drive(#[from] gdrive_core::DriveError),
    #[error("remote object not found: {0}")]
    NotFound(String),
    #[error("remote rejected the request: {0}")]
    Rejected(String),
    #[error("time parse error: {0}")]
    Time(#[from] time::error::Parse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    File,
    Folder,
}

impl ObjectKind {
    pub fn is_folder(self) -> bool {
        self == ObjectKind::Folder
    }
}

/// One row of the full listing used to build the path index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub id: String,
    pub title: String,
    pub kind: ObjectKind,
    pub parent_ids: Vec<String>,
    /// Set when the backend flags one of the parents as the drive root,
    /// whatever that root's concrete id is.
    pub is_root_child: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub id: String,
    pub title: String,
    pub kind: ObjectKind,
    pub size: u64,
    pub created: Option<OffsetDateTime>,
    pub modified: Option<OffsetDateTime>,
    pub accessed: Option<OffsetDateTime>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Every non-trashed object with its parent ids.
    async fn list_objects(&self) -> Result<Vec<ObjectSummary>, RemoteError>;

    async fn get_object(&self, id: &str) -> Result<ObjectInfo, RemoteError>;

    /// Creates an object under `parent_id` and returns its new id.
    async fn create_object(
        &self,
        title: &str,
        parent_id: &str,
        kind: ObjectKind,
        content: Option<&[u8]>,
    ) -> Result<String, RemoteError>;

    async fn fetch_content(&self, id: &str) -> Result<Vec<u8>, RemoteError>;

    /// Overwrites the full body of a file object.
    async fn replace_content(&self, id: &str, content: &[u8]) -> Result<(), RemoteError>;

    async fn rename_object(&self, id: &str, new_title: &str) -> Result<(), RemoteError>;

    /// Changes the title and swaps `from_parent` for `to_parent` in one call.
    async fn move_object(
        &self,
        id: &str,
        new_title: &str,
        from_parent: &str,
        to_parent: &str,
    ) -> Result<(), RemoteError>;

    /// Server-side copy of a file into `new_parent_id`; returns the copy's id.
    async fn copy_object(
        &self,
        id: &str,
        new_title: &str,
        new_parent_id: &str,
    ) -> Result<String, RemoteError>;

    async fn delete_object(&self, id: &str) -> Result<(), RemoteError>;
}
