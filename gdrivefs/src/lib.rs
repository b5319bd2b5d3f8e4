pub mod config;
pub mod fs;

pub use fs::{
    DriveFile, DriveFs, ErrorKind, FileInfo, FsError, FsMeta, ListOptions, OpenMode,
};
