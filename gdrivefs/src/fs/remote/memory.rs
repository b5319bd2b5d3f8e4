use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{ObjectInfo, ObjectKind, ObjectSummary, RemoteError, RemoteStore};
use crate::fs::index::ROOT_ID;

#[derive(Debug, Clone)]
struct MemoryObject {
    title: String,
    kind: ObjectKind,
    parents: Vec<String>,
    content: Vec<u8>,
    created: OffsetDateTime,
    modified: OffsetDateTime,
    trashed: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, MemoryObject>,
    next_id: u64,
    rejected_titles: HashSet<String>,
    operations: Vec<String>,
}

/// In-process object store with Drive's data model: ids, non-unique
/// titles, multiple parents, and no path awareness.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object with a caller-chosen id, bypassing every check.
    /// Used to model state created by other clients of the store.
    pub fn seed(&self, id: &str, title: &str, kind: ObjectKind, parents: &[&str], content: &[u8]) {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.objects.insert(
            id.to_string(),
            MemoryObject {
                title: title.to_string(),
                kind,
                parents: parents.iter().map(|p| p.to_string()).collect(),
                content: content.to_vec(),
                created: now,
                modified: now,
                trashed: false,
            },
        );
    }

    pub fn trash(&self, id: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(object) = state.objects.get_mut(id) {
            object.trashed = true;
        }
    }

    /// Makes every later `create_object` call with this title fail.
    pub fn reject_creates_titled(&self, title: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.rejected_titles.insert(title.to_string());
    }

    pub fn object_count(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.objects.values().filter(|o| !o.trashed).count()
    }

    pub fn parents_of(&self, id: &str) -> Option<Vec<String>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.objects.get(id).map(|o| o.parents.clone())
    }

    pub fn title_of(&self, id: &str) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.objects.get(id).map(|o| o.title.clone())
    }

    /// Log of mutating calls in the order they were applied, e.g.
    /// `create:a`, `delete:mem-3`.
    pub fn operations(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.operations.clone()
    }

    fn live<'a>(state: &'a MemoryState, id: &str) -> Result<&'a MemoryObject, RemoteError> {
        state
            .objects
            .get(id)
            .filter(|o| !o.trashed)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    fn live_mut<'a>(
        state: &'a mut MemoryState,
        id: &str,
    ) -> Result<&'a mut MemoryObject, RemoteError> {
        state
            .objects
            .get_mut(id)
            .filter(|o| !o.trashed)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    fn require_folder(state: &MemoryState, id: &str) -> Result<(), RemoteError> {
        if id == ROOT_ID {
            return Ok(());
        }
        match Self::live(state, id)?.kind {
            ObjectKind::Folder => Ok(()),
            ObjectKind::File => Err(RemoteError::Rejected(format!("{id} is not a folder"))),
        }
    }

    fn allocate_id(state: &mut MemoryState) -> String {
        state.next_id += 1;
        format!("mem-{}", state.next_id)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_objects(&self) -> Result<Vec<ObjectSummary>, RemoteError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .objects
            .iter()
            .filter(|(_, o)| !o.trashed)
            .map(|(id, o)| ObjectSummary {
                id: id.clone(),
                title: o.title.clone(),
                kind: o.kind,
                parent_ids: o.parents.clone(),
                is_root_child: o.parents.iter().any(|p| p == ROOT_ID),
            })
            .collect())
    }

    async fn get_object(&self, id: &str) -> Result<ObjectInfo, RemoteError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let object = Self::live(&state, id)?;
        Ok(ObjectInfo {
            id: id.to_string(),
            title: object.title.clone(),
            kind: object.kind,
            size: object.content.len() as u64,
            created: Some(object.created),
            modified: Some(object.modified),
            accessed: None,
        })
    }

    async fn create_object(
        &self,
        title: &str,
        parent_id: &str,
        kind: ObjectKind,
        content: Option<&[u8]>,
    ) -> Result<String, RemoteError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.rejected_titles.contains(title) {
            return Err(RemoteError::Rejected(format!("create of {title}")));
        }
        Self::require_folder(&state, parent_id)?;
        let id = Self::allocate_id(&mut state);
        let now = OffsetDateTime::now_utc();
        state.objects.insert(
            id.clone(),
            MemoryObject {
                title: title.to_string(),
                kind,
                parents: vec![parent_id.to_string()],
                content: content.map(<[u8]>::to_vec).unwrap_or_default(),
                created: now,
                modified: now,
                trashed: false,
            },
        );
        state.operations.push(format!("create:{title}"));
        Ok(id)
    }

    async fn fetch_content(&self, id: &str) -> Result<Vec<u8>, RemoteError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(Self::live(&state, id)?.content.clone())
    }

    async fn replace_content(&self, id: &str, content: &[u8]) -> Result<(), RemoteError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let object = Self::live_mut(&mut state, id)?;
        object.content = content.to_vec();
        object.modified = OffsetDateTime::now_utc();
        state.operations.push(format!("update:{id}"));
        Ok(())
    }

    async fn rename_object(&self, id: &str, new_title: &str) -> Result<(), RemoteError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        Self::live_mut(&mut state, id)?.title = new_title.to_string();
        state.operations.push(format!("rename:{id}:{new_title}"));
        Ok(())
    }

    async fn move_object(
        &self,
        id: &str,
        new_title: &str,
        from_parent: &str,
        to_parent: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        Self::require_folder(&state, to_parent)?;
        let object = Self::live_mut(&mut state, id)?;
        object.title = new_title.to_string();
        object.parents.retain(|p| p != from_parent);
        if !object.parents.iter().any(|p| p == to_parent) {
            object.parents.push(to_parent.to_string());
        }
        state.operations.push(format!("move:{id}:{to_parent}"));
        Ok(())
    }

    async fn copy_object(
        &self,
        id: &str,
        new_title: &str,
        new_parent_id: &str,
    ) -> Result<String, RemoteError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let source = Self::live(&state, id)?.clone();
        if source.kind == ObjectKind::Folder {
            return Err(RemoteError::Rejected(format!("{id} is a folder")));
        }
        Self::require_folder(&state, new_parent_id)?;
        let copy_id = Self::allocate_id(&mut state);
        let now = OffsetDateTime::now_utc();
        state.objects.insert(
            copy_id.clone(),
            MemoryObject {
                title: new_title.to_string(),
                parents: vec![new_parent_id.to_string()],
                created: now,
                modified: now,
                ..source
            },
        );
        state.operations.push(format!("copy:{id}:{new_title}"));
        Ok(copy_id)
    }

    async fn delete_object(&self, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.objects.remove(id).is_none() {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        // Deleting a folder takes every object left without a parent with it.
        loop {
            let orphans: Vec<String> = state
                .objects
                .iter()
                .filter(|(_, o)| {
                    !o.parents.is_empty()
                        && o.parents
                            .iter()
                            .all(|p| p != ROOT_ID && !state.objects.contains_key(p))
                })
                .map(|(id, _)| id.clone())
                .collect();
            if orphans.is_empty() {
                break;
            }
            for orphan in orphans {
                state.objects.remove(&orphan);
            }
        }
        state.operations.push(format!("delete:{id}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_requires_folder_parent() {
        let store = MemoryStore::new();
        let file = store
            .create_object("a.txt", ROOT_ID, ObjectKind::File, Some(b"x"))
            .await
            .unwrap();
        let err = store
            .create_object("b.txt", &file, ObjectKind::File, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
        let err = store
            .create_object("b.txt", "nope", ObjectKind::File, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_cascades_to_orphans() {
        let store = MemoryStore::new();
        store.seed("dir", "dir", ObjectKind::Folder, &[ROOT_ID], b"");
        store.seed("sub", "sub", ObjectKind::Folder, &["dir"], b"");
        store.seed("leaf", "leaf", ObjectKind::File, &["sub"], b"x");
        store.seed("other", "other", ObjectKind::File, &[ROOT_ID], b"y");

        store.delete_object("dir").await.unwrap();

        assert_eq!(store.object_count(), 1);
        assert!(store.title_of("other").is_some());
    }

    #[tokio::test]
    async fn trashed_objects_are_not_listed() {
        let store = MemoryStore::new();
        store.seed("a", "a", ObjectKind::File, &[ROOT_ID], b"");
        store.seed("b", "b", ObjectKind::File, &[ROOT_ID], b"");
        store.trash("a");

        let listed = store.list_objects().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "b");
        assert!(listed[0].is_root_child);
        assert!(matches!(
            store.fetch_content("a").await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn copy_duplicates_content_under_new_parent() {
        let store = MemoryStore::new();
        store.seed("dir", "dir", ObjectKind::Folder, &[ROOT_ID], b"");
        store.seed("a", "a", ObjectKind::File, &[ROOT_ID], b"body");

        let copy = store.copy_object("a", "b", "dir").await.unwrap();

        assert_eq!(store.fetch_content(&copy).await.unwrap(), b"body");
        assert_eq!(store.parents_of(&copy).unwrap(), vec!["dir".to_string()]);
        assert_eq!(store.title_of("a").unwrap(), "a");
    }
}
