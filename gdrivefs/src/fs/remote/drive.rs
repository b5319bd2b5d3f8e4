use async_trait::async_trait;
use gdrive_core::{DriveClient, DriveError, DriveFile, FilePatch, NewFile};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{ObjectInfo, ObjectKind, ObjectSummary, RemoteError, RemoteStore};

const LIST_QUERY: &str = "trashed=false";
const LIST_FIELDS: &str = "nextPageToken,items(id,title,mimeType,parents(id,isRoot))";
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// [`RemoteStore`] backed by the Drive v2 REST API.
#[derive(Clone)]
pub struct DriveStore {
    client: DriveClient,
    page_size: u32,
}

impl DriveStore {
    pub fn new(client: DriveClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn list_objects(&self) -> Result<Vec<ObjectSummary>, RemoteError> {
        let files = self
            .client
            .list_files(LIST_QUERY, Some(LIST_FIELDS), self.page_size)
            .await?;
        Ok(files
            .into_iter()
            .filter(|file| !file.is_trashed())
            .map(summary_from_file)
            .collect())
    }

    async fn get_object(&self, id: &str) -> Result<ObjectInfo, RemoteError> {
        let file = self.client.get_file(id).await.map_err(|e| not_found(e, id))?;
        info_from_file(file)
    }

    async fn create_object(
        &self,
        title: &str,
        parent_id: &str,
        kind: ObjectKind,
        content: Option<&[u8]>,
    ) -> Result<String, RemoteError> {
        let metadata = match kind {
            ObjectKind::Folder => NewFile::folder(title, parent_id),
            ObjectKind::File => NewFile::file(title, parent_id),
        };
        // Metadata and body travel in one request so a failure creates nothing.
        let created = match content {
            Some(content) => {
                self.client
                    .insert_file_with_content(&metadata, content.to_vec())
                    .await?
            }
            None => self.client.insert_file(&metadata).await?,
        };
        Ok(created.id)
    }

    async fn fetch_content(&self, id: &str) -> Result<Vec<u8>, RemoteError> {
        self.client.download(id).await.map_err(|e| not_found(e, id))
    }

    async fn replace_content(&self, id: &str, content: &[u8]) -> Result<(), RemoteError> {
        self.client
            .upload_content(id, content.to_vec())
            .await
            .map_err(|e| not_found(e, id))?;
        Ok(())
    }

    async fn rename_object(&self, id: &str, new_title: &str) -> Result<(), RemoteError> {
        let patch = FilePatch {
            title: Some(new_title.to_string()),
        };
        self.client
            .patch_file(id, &patch, None, None)
            .await
            .map_err(|e| not_found(e, id))?;
        Ok(())
    }

    async fn move_object(
        &self,
        id: &str,
        new_title: &str,
        from_parent: &str,
        to_parent: &str,
    ) -> Result<(), RemoteError> {
        let patch = FilePatch {
            title: Some(new_title.to_string()),
        };
        self.client
            .patch_file(id, &patch, Some(to_parent), Some(from_parent))
            .await
            .map_err(|e| not_found(e, id))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        id: &str,
        new_title: &str,
        new_parent_id: &str,
    ) -> Result<String, RemoteError> {
        let copy = self
            .client
            .copy_file(id, &NewFile::file(new_title, new_parent_id))
            .await
            .map_err(|e| not_found(e, id))?;
        Ok(copy.id)
    }

    async fn delete_object(&self, id: &str) -> Result<(), RemoteError> {
        self.client.delete_file(id).await.map_err(|e| not_found(e, id))
    }
}

fn not_found(err: DriveError, id: &str) -> RemoteError {
    if err.is_not_found() {
        RemoteError::NotFound(id.to_string())
    } else {
        RemoteError::Drive(err)
    }
}

fn kind_of(file: &DriveFile) -> ObjectKind {
    if file.is_folder() {
        ObjectKind::Folder
    } else {
        ObjectKind::File
    }
}

fn summary_from_file(file: DriveFile) -> ObjectSummary {
    ObjectSummary {
        kind: kind_of(&file),
        is_root_child: file.is_root_child(),
        parent_ids: file.parents.into_iter().map(|parent| parent.id).collect(),
        id: file.id,
        title: file.title,
    }
}

fn info_from_file(file: DriveFile) -> Result<ObjectInfo, RemoteError> {
    Ok(ObjectInfo {
        kind: kind_of(&file),
        size: file.size().unwrap_or(0),
        created: parse_date(file.created_date.as_deref())?,
        modified: parse_date(file.modified_date.as_deref())?,
        accessed: parse_date(file.last_viewed_by_me_date.as_deref())?,
        id: file.id,
        title: file.title,
    })
}

fn parse_date(value: Option<&str>) -> Result<Option<OffsetDateTime>, time::error::Parse> {
    let Some(value) = value else {
        return Ok(None);
    };
    Ok(Some(OffsetDateTime::parse(value, &Rfc3339)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdrive_core::ParentReference;

    fn file(id: &str, title: &str, mime: Option<&str>, parents: &[(&str, bool)]) -> DriveFile {
        DriveFile {
            id: id.into(),
            title: title.into(),
            mime_type: mime.map(str::to_string),
            parents: parents
                .iter()
                .map(|(id, is_root)| ParentReference {
                    id: (*id).into(),
                    is_root: *is_root,
                })
                .collect(),
            file_size: None,
            created_date: None,
            modified_date: None,
            last_viewed_by_me_date: None,
            labels: None,
        }
    }

    #[test]
    fn summary_marks_root_children_and_folders() {
        let summary = summary_from_file(file(
            "b",
            "B",
            Some(gdrive_core::FOLDER_MIME_TYPE),
            &[("0Bx", true)],
        ));
        assert_eq!(summary.kind, ObjectKind::Folder);
        assert!(summary.is_root_child);
        assert_eq!(summary.parent_ids, vec!["0Bx".to_string()]);
    }

    #[test]
    fn info_parses_drive_dates() {
        let mut source = file("a", "A", Some("text/plain"), &[("b", false)]);
        source.file_size = Some("5".into());
        source.modified_date = Some("2024-01-02T03:04:05.000Z".into());
        let info = info_from_file(source).unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.kind, ObjectKind::File);
        assert_eq!(info.modified.unwrap().unix_timestamp(), 1_704_164_645);
        assert!(info.created.is_none());
    }

    #[test]
    fn invalid_dates_are_errors() {
        assert!(parse_date(Some("yesterday")).is_err());
        assert!(parse_date(None).unwrap().is_none());
    }
}
