use serde::{Deserialize, Serialize};

/// MIME type Drive uses to mark an object as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub parents: Vec<ParentReference>,
    /// int64 values are transported as JSON strings by the v2 API.
    #[serde(default)]
    pub file_size: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub modified_date: Option<String>,
    #[serde(default)]
    pub last_viewed_by_me_date: Option<String>,
    #[serde(default)]
    pub labels: Option<FileLabels>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    pub fn is_root_child(&self) -> bool {
        self.parents.iter().any(|parent| parent.is_root)
    }

    pub fn is_trashed(&self) -> bool {
        self.labels.as_ref().is_some_and(|labels| labels.trashed)
    }

    pub fn size(&self) -> Option<u64> {
        self.file_size.as_deref().and_then(|value| value.parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    pub id: String,
    #[serde(default)]
    pub is_root: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileLabels {
    #[serde(default)]
    pub trashed: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub items: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata body for `files.insert` and `files.copy`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ParentId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParentId {
    pub id: String,
}

impl NewFile {
    pub fn file(title: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            mime_type: None,
            parents: vec![ParentId {
                id: parent_id.into(),
            }],
        }
    }

    pub fn folder(title: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            ..Self::file(title, parent_id)
        }
    }
}

/// Partial metadata body for `files.patch`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_body_carries_mime_type_and_parent() {
        let body = serde_json::to_value(NewFile::folder("Docs", "root")).unwrap();
        assert_eq!(body["title"], "Docs");
        assert_eq!(body["mimeType"], FOLDER_MIME_TYPE);
        assert_eq!(body["parents"][0]["id"], "root");
    }

    #[test]
    fn file_size_is_parsed_from_string() {
        let file: DriveFile = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "title": "a.txt",
            "fileSize": "42",
            "parents": [{"id": "0Bx", "isRoot": true}]
        }))
        .unwrap();
        assert_eq!(file.size(), Some(42));
        assert!(file.is_root_child());
        assert!(!file.is_folder());
        assert!(!file.is_trashed());
    }
}
