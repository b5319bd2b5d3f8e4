use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::model::{DriveFile, FileList, FilePatch, NewFile};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const MULTIPART_BOUNDARY: &str = "gdrive-core-multipart-boundary";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("base url cannot carry a path: {0}")]
    BaseUrl(String),
    #[error("failed to encode metadata: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(DriveError::BaseUrl(base_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: token.into(),
        })
    }

    /// Lists every file matching `query`, following page tokens until the
    /// listing is exhausted.
    pub async fn list_files(
        &self,
        query: &str,
        fields: Option<&str>,
        page_size: u32,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let page_size = page_size.max(1).to_string();
        let mut page_token: Option<String> = None;
        let mut items = Vec::new();
        loop {
            let mut url = self.endpoint(&["drive", "v2", "files"])?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("q", query);
                pairs.append_pair("maxResults", &page_size);
                if let Some(fields) = fields.filter(|f| !f.is_empty()) {
                    pairs.append_pair("fields", fields);
                }
                if let Some(token) = page_token.as_deref() {
                    pairs.append_pair("pageToken", token);
                }
            }
            let response = self
                .http
                .get(url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            let page: FileList = Self::handle_response(response).await?;
            items.extend(page.items);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(items)
    }

    pub async fn get_file(&self, id: &str) -> Result<DriveFile, DriveError> {
        let url = self.endpoint(&["drive", "v2", "files", id])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn download(&self, id: &str) -> Result<Vec<u8>, DriveError> {
        let mut url = self.endpoint(&["drive", "v2", "files", id])?;
        url.query_pairs_mut().append_pair("alt", "media");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn insert_file(&self, metadata: &NewFile) -> Result<DriveFile, DriveError> {
        let url = self.endpoint(&["drive", "v2", "files"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(metadata)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Creates a file with its metadata and body in one multipart request,
    /// so a failed transfer leaves no object behind.
    pub async fn insert_file_with_content(
        &self,
        metadata: &NewFile,
        body: Vec<u8>,
    ) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint(&["upload", "drive", "v2", "files"])?;
        url.query_pairs_mut().append_pair("uploadType", "multipart");
        let metadata = serde_json::to_vec(metadata)?;
        let boundary = multipart_boundary(&body);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(multipart_related(&boundary, &metadata, &body))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Replaces the whole body of an existing file.
    pub async fn upload_content(&self, id: &str, body: Vec<u8>) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint(&["upload", "drive", "v2", "files", id])?;
        url.query_pairs_mut().append_pair("uploadType", "media");
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn patch_file(
        &self,
        id: &str,
        patch: &FilePatch,
        add_parents: Option<&str>,
        remove_parents: Option<&str>,
    ) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint(&["drive", "v2", "files", id])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(parents) = add_parents {
                pairs.append_pair("addParents", parents);
            }
            if let Some(parents) = remove_parents {
                pairs.append_pair("removeParents", parents);
            }
        }
        let response = self
            .http
            .patch(url)
            .bearer_auth(&self.token)
            .json(patch)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn copy_file(&self, id: &str, metadata: &NewFile) -> Result<DriveFile, DriveError> {
        let url = self.endpoint(&["drive", "v2", "files", id, "copy"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(metadata)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn delete_file(&self, id: &str) -> Result<(), DriveError> {
        let url = self.endpoint(&["drive", "v2", "files", id])?;
        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DriveError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DriveError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DriveError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        let response = Self::check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// A boundary that does not occur inside `body`.
fn multipart_boundary(body: &[u8]) -> String {
    let mut boundary = MULTIPART_BOUNDARY.to_string();
    let mut suffix = 0u32;
    while body
        .windows(boundary.len())
        .any(|window| window == boundary.as_bytes())
    {
        suffix += 1;
        boundary = format!("{MULTIPART_BOUNDARY}-{suffix}");
    }
    boundary
}

fn multipart_related(boundary: &str, metadata: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(metadata.len() + body.len() + 4 * boundary.len() + 128);
    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    out.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    out.extend_from_slice(metadata);
    out.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    out.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    out.extend_from_slice(body);
    out.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    out
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}
