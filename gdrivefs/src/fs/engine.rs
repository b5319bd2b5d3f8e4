use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::FsError;
use super::handle::{DriveFile, OpenMode};
use super::index::{IndexEntry, PathIndex};
use super::paths::{Wildcard, basename, dirname, is_descendant, join, lineage, normalize};
use super::remote::{ObjectKind, RemoteStore};

pub const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(30);

/// Filters and output shape for [`DriveFs::listdir`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Shell-style pattern matched against entry names.
    pub wildcard: Option<String>,
    /// Return paths relative to the root (`a/b`) instead of bare names.
    pub full: bool,
    /// Return absolute paths (`/a/b`) instead of bare names. `full` wins
    /// when both are set.
    pub absolute: bool,
    pub dirs_only: bool,
    pub files_only: bool,
}

impl ListOptions {
    pub fn dirs() -> Self {
        Self {
            dirs_only: true,
            ..Self::default()
        }
    }

    pub fn files() -> Self {
        Self {
            files_only: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub created_time: Option<OffsetDateTime>,
    pub modified_time: Option<OffsetDateTime>,
    pub accessed_time: Option<OffsetDateTime>,
}

/// Capabilities advertised to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsMeta {
    pub thread_safe: bool,
    pub is_virtual: bool,
    pub read_only: bool,
    pub case_insensitive_paths: bool,
    pub network: bool,
    pub atomic_setcontents: bool,
    pub atomic_makedir: bool,
    pub atomic_rename: bool,
    pub mime_type: &'static str,
}

const META: FsMeta = FsMeta {
    thread_safe: true,
    is_virtual: false,
    read_only: false,
    case_insensitive_paths: false,
    network: true,
    atomic_setcontents: false,
    atomic_makedir: true,
    atomic_rename: true,
    mime_type: "virtual/googledrive",
};

/// Path-addressed filesystem over an id-addressed [`RemoteStore`].
///
/// Every operation holds the index lock from validation until its index
/// update, so operations on one `DriveFs` never interleave. Composite
/// operations (recursive `makedir`, forced `removedir`) are best effort:
/// a failing sub-step is returned as-is, earlier sub-steps stay applied
/// remotely and in the index, and nothing is rolled back.
pub struct DriveFs {
    store: Arc<dyn RemoteStore>,
    index: Mutex<PathIndex>,
    index_ttl: Duration,
}

impl DriveFs {
    pub async fn new(store: Arc<dyn RemoteStore>) -> Result<Self, FsError> {
        Self::with_index_ttl(store, DEFAULT_INDEX_TTL).await
    }

    /// `index_ttl` bounds how stale the index may be when listing a
    /// directory; zero rebuilds it on every listing.
    pub async fn with_index_ttl(
        store: Arc<dyn RemoteStore>,
        index_ttl: Duration,
    ) -> Result<Self, FsError> {
        let index = build_index(store.as_ref()).await?;
        Ok(Self {
            store,
            index: Mutex::new(index),
            index_ttl,
        })
    }

    pub fn meta(&self) -> FsMeta {
        META
    }

    /// Rebuilds the index from a full listing; returns the indexed path count.
    pub async fn refresh(&self) -> Result<usize, FsError> {
        let mut index = self.index.lock().await;
        *index = build_index(self.store.as_ref()).await?;
        Ok(index.len())
    }

    pub async fn exists(&self, path: &str) -> bool {
        self.kind_of(path).await.is_some()
    }

    pub async fn isdir(&self, path: &str) -> bool {
        self.kind_of(path).await == Some(ObjectKind::Folder)
    }

    pub async fn isfile(&self, path: &str) -> bool {
        self.kind_of(path).await == Some(ObjectKind::File)
    }

    pub async fn open(&self, path: &str, mode: &str) -> Result<DriveFile<'_>, FsError> {
        let mode: OpenMode = mode.parse()?;
        let path = normalize(path)?;
        let mut index = self.index.lock().await;

        let existing = index.kind(&path);
        if existing == Some(ObjectKind::Folder) {
            return Err(FsError::ResourceInvalid(path));
        }
        if mode.writable() && index.kind(dirname(&path)) != Some(ObjectKind::Folder) {
            return Err(FsError::ParentDirectoryMissing(path));
        }
        if mode.requires_existing() && existing.is_none() {
            return Err(FsError::ResourceNotFound(path));
        }

        let mut existed = existing.is_some();
        if existed && mode.recreates() {
            self.delete_path(&mut index, &path).await?;
            existed = false;
        }
        let contents = if existed && mode.loads_existing() {
            let id = index.resolve(&path)?.id.clone();
            self.store.fetch_content(&id).await?
        } else {
            Vec::new()
        };
        drop(index);

        Ok(DriveFile::new(self, path, mode, contents, existed))
    }

    /// Fetches a file's full body in a single transfer.
    pub async fn getcontents(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let path = normalize(path)?;
        let index = self.index.lock().await;
        let id = require_file(&index, &path)?.id.clone();
        Ok(self.store.fetch_content(&id).await?)
    }

    /// Replaces the body of an existing file or creates a new one.
    pub async fn setcontents(&self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut index = self.index.lock().await;
        match index.get(&path) {
            Some(entry) if entry.kind.is_folder() => Err(FsError::ResourceInvalid(path)),
            Some(entry) => {
                self.store.replace_content(&entry.id, data).await?;
                debug!(path = %path, id = %entry.id, bytes = data.len(), "replaced content");
                Ok(())
            }
            None => {
                let parent_id = folder_id(&index, dirname(&path))
                    .ok_or_else(|| FsError::ParentDirectoryMissing(path.clone()))?;
                let id = self
                    .store
                    .create_object(basename(&path), &parent_id, ObjectKind::File, Some(data))
                    .await?;
                debug!(path = %path, id = %id, bytes = data.len(), "created file");
                index.insert(&path, IndexEntry::new(id, ObjectKind::File));
                Ok(())
            }
        }
    }

    pub async fn listdir(&self, path: &str, options: &ListOptions) -> Result<Vec<String>, FsError> {
        if options.dirs_only && options.files_only {
            return Err(FsError::InvalidArgument(
                "dirs_only and files_only are mutually exclusive".to_string(),
            ));
        }
        let wildcard = options.wildcard.as_deref().map(Wildcard::new).transpose()?;
        let path = normalize(path)?;
        let mut index = self.index.lock().await;
        require_dir(&index, &path)?;
        if index.age() >= self.index_ttl {
            *index = build_index(self.store.as_ref()).await?;
            require_dir(&index, &path)?;
        }

        Ok(index
            .children(&path)
            .into_iter()
            .filter(|(_, entry)| match entry.kind {
                ObjectKind::Folder => !options.files_only,
                ObjectKind::File => !options.dirs_only,
            })
            .filter(|(name, _)| wildcard.as_ref().is_none_or(|w| w.matches(name)))
            .map(|(name, _)| {
                if options.full {
                    join(&path, name)[1..].to_string()
                } else if options.absolute {
                    join(&path, name)
                } else {
                    name.to_string()
                }
            })
            .collect())
    }

    pub async fn makedir(
        &self,
        path: &str,
        recursive: bool,
        allow_recreate: bool,
    ) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut index = self.index.lock().await;
        match index.kind(&path) {
            Some(ObjectKind::Folder) if allow_recreate => return Ok(()),
            Some(ObjectKind::Folder) => return Err(FsError::DestinationExists(path)),
            Some(ObjectKind::File) => return Err(FsError::ResourceInvalid(path)),
            None => {}
        }
        let parent = dirname(&path);
        if !recursive && index.kind(parent) != Some(ObjectKind::Folder) {
            return Err(FsError::ParentDirectoryMissing(path));
        }
        for ancestor in lineage(&path) {
            match index.kind(ancestor) {
                Some(ObjectKind::Folder) => {}
                Some(ObjectKind::File) => return Err(FsError::ResourceInvalid(ancestor.to_string())),
                None => self.create_folder(&mut index, ancestor).await?,
            }
        }
        Ok(())
    }

    /// Deletes a file.
    pub async fn remove(&self, path: &str) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut index = self.index.lock().await;
        require_file(&index, &path)?;
        self.delete_path(&mut index, &path).await
    }

    /// Deletes a directory. `force` removes its contents first, otherwise a
    /// non-empty directory is refused; `recursive` then also removes
    /// ancestors left empty, stopping below the root.
    pub async fn removedir(&self, path: &str, recursive: bool, force: bool) -> Result<(), FsError> {
        let path = normalize(path)?;
        if path == "/" {
            return Err(FsError::RemoveRoot);
        }
        let mut index = self.index.lock().await;
        // Emptiness must be judged against the store, not a stale index.
        *index = build_index(self.store.as_ref()).await?;
        require_dir(&index, &path)?;

        if force {
            for (child, _) in removal_order(&index, &path) {
                self.delete_path(&mut index, &child).await?;
            }
        } else if !index.children(&path).is_empty() {
            return Err(FsError::DirectoryNotEmpty(path));
        }
        self.delete_path(&mut index, &path).await?;

        if recursive {
            let mut current = dirname(&path).to_string();
            while current != "/" && index.children(&current).is_empty() {
                self.delete_path(&mut index, &current).await?;
                current = dirname(&current).to_string();
            }
        }
        Ok(())
    }

    /// Renames `src` to `dst`, reparenting the object when the two live in
    /// different directories.
    pub async fn rename(&self, src: &str, dst: &str) -> Result<(), FsError> {
        let src = normalize(src)?;
        let dst = normalize(dst)?;
        let mut index = self.index.lock().await;
        let entry = index
            .get(&src)
            .cloned()
            .ok_or_else(|| FsError::ResourceNotFound(src.clone()))?;
        if index.get(&dst).is_some() {
            return Err(FsError::DestinationExists(dst));
        }
        if is_descendant(&src, &dst) {
            return Err(FsError::ResourceInvalid(dst));
        }
        let to_parent = folder_id(&index, dirname(&dst))
            .ok_or_else(|| FsError::ParentDirectoryMissing(dst.clone()))?;

        let title = basename(&dst);
        if dirname(&src) == dirname(&dst) {
            self.store.rename_object(&entry.id, title).await?;
        } else {
            let from_parent = index.resolve(dirname(&src))?.id.clone();
            self.store
                .move_object(&entry.id, title, &from_parent, &to_parent)
                .await?;
        }
        debug!(src = %src, dst = %dst, id = %entry.id, "renamed");
        index.rename(&src, &dst)?;
        Ok(())
    }

    /// Copies a file server-side, leaving `src` untouched.
    pub async fn copy(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), FsError> {
        let src = normalize(src)?;
        let dst = normalize(dst)?;
        let mut index = self.index.lock().await;
        let src_id = require_file(&index, &src)?.id.clone();
        if src == dst {
            return Err(FsError::ResourceInvalid(dst));
        }
        match index.kind(&dst) {
            Some(ObjectKind::Folder) => return Err(FsError::ResourceInvalid(dst)),
            Some(ObjectKind::File) if overwrite => self.delete_path(&mut index, &dst).await?,
            Some(ObjectKind::File) => return Err(FsError::DestinationExists(dst)),
            None => {}
        }
        let parent_id = folder_id(&index, dirname(&dst))
            .ok_or_else(|| FsError::ParentDirectoryMissing(dst.clone()))?;

        let id = self
            .store
            .copy_object(&src_id, basename(&dst), &parent_id)
            .await?;
        debug!(src = %src, dst = %dst, id = %id, "copied file");
        index.insert(&dst, IndexEntry::new(id, ObjectKind::File));
        Ok(())
    }

    /// Size and timestamps of a file. Directories expose no metadata.
    pub async fn getinfo(&self, path: &str) -> Result<FileInfo, FsError> {
        let path = normalize(path)?;
        let index = self.index.lock().await;
        let id = require_file(&index, &path)?.id.clone();
        let info = self.store.get_object(&id).await?;
        Ok(FileInfo {
            size: info.size,
            created_time: info.created,
            modified_time: info.modified,
            accessed_time: info.accessed,
        })
    }

    async fn kind_of(&self, path: &str) -> Option<ObjectKind> {
        let path = normalize(path).ok()?;
        self.index.lock().await.kind(&path)
    }

    async fn create_folder(&self, index: &mut PathIndex, path: &str) -> Result<(), FsError> {
        let parent_id = index.resolve(dirname(path))?.id.clone();
        let id = self
            .store
            .create_object(basename(path), &parent_id, ObjectKind::Folder, None)
            .await?;
        debug!(path = %path, id = %id, "created folder");
        index.insert(path, IndexEntry::new(id, ObjectKind::Folder));
        Ok(())
    }

    async fn delete_path(&self, index: &mut PathIndex, path: &str) -> Result<(), FsError> {
        let id = index.resolve(path)?.id.clone();
        self.store.delete_object(&id).await?;
        debug!(path = %path, id = %id, "deleted");
        index.remove(path);
        Ok(())
    }
}

async fn build_index(store: &dyn RemoteStore) -> Result<PathIndex, FsError> {
    let started = Instant::now();
    let objects = store.list_objects().await?;
    let index = PathIndex::build(&objects);
    debug!(
        objects = objects.len(),
        paths = index.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "rebuilt path index"
    );
    Ok(index)
}

fn folder_id(index: &PathIndex, path: &str) -> Option<String> {
    index
        .get(path)
        .filter(|entry| entry.kind.is_folder())
        .map(|entry| entry.id.clone())
}

fn require_file<'i>(index: &'i PathIndex, path: &str) -> Result<&'i IndexEntry, FsError> {
    match index.get(path) {
        Some(entry) if entry.kind == ObjectKind::File => Ok(entry),
        Some(_) => Err(FsError::ResourceInvalid(path.to_string())),
        None => Err(missing(index, path)),
    }
}

fn require_dir<'i>(index: &'i PathIndex, path: &str) -> Result<&'i IndexEntry, FsError> {
    match index.get(path) {
        Some(entry) if entry.kind.is_folder() => Ok(entry),
        Some(_) => Err(FsError::ResourceInvalid(path.to_string())),
        None => Err(missing(index, path)),
    }
}

fn missing(index: &PathIndex, path: &str) -> FsError {
    if index.kind(dirname(path)) == Some(ObjectKind::Folder) {
        FsError::ResourceNotFound(path.to_string())
    } else {
        FsError::ParentDirectoryMissing(path.to_string())
    }
}

/// Order in which a forced `removedir` deletes the contents of `dir`: for
/// every directory, its subdirectories (each emptied first) and then its
/// files.
fn removal_order(index: &PathIndex, dir: &str) -> Vec<(String, ObjectKind)> {
    let mut order = Vec::new();
    let children = index.children(dir);
    for (name, entry) in &children {
        if entry.kind.is_folder() {
            let child = join(dir, name);
            order.extend(removal_order(index, &child));
            order.push((child, ObjectKind::Folder));
        }
    }
    for (name, entry) in &children {
        if !entry.kind.is_folder() {
            order.push((join(dir, name), ObjectKind::File));
        }
    }
    order
}
