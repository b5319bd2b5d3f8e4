pub mod engine;
pub mod error;
pub mod handle;
pub mod index;
pub mod paths;
pub mod remote;

pub use engine::{DriveFs, FileInfo, FsMeta, ListOptions};
pub use error::{ErrorKind, FsError};
pub use handle::{DriveFile, OpenMode};
pub use index::{IndexEntry, IndexError, PathIndex, ROOT_ID};
pub use remote::{ObjectInfo, ObjectKind, ObjectSummary, RemoteError, RemoteStore};
