mod client;
mod model;

pub use client::{ApiErrorClass, DriveClient, DriveError};
pub use model::{
    DriveFile, FOLDER_MIME_TYPE, FileLabels, FileList, FilePatch, NewFile, ParentId,
    ParentReference,
};
