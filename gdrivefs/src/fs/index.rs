use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use super::paths::{is_descendant, join};
use super::remote::{ObjectKind, ObjectSummary};

/// Id the remote store accepts as an alias for the drive root.
pub const ROOT_ID: &str = "root";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("path is not indexed: {0}")]
    NotIndexed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub kind: ObjectKind,
}

impl IndexEntry {
    pub fn new(id: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Bidirectional map between normalized absolute paths and remote ids.
///
/// The map reflects the store as of the last [`PathIndex::build`] plus
/// whatever edits the engine applied since; it never talks to the store
/// itself.
#[derive(Debug, Clone)]
pub struct PathIndex {
    by_path: BTreeMap<String, IndexEntry>,
    by_id: HashMap<String, String>,
    built_at: Instant,
}

impl Default for PathIndex {
    fn default() -> Self {
        let mut index = Self {
            by_path: BTreeMap::new(),
            by_id: HashMap::new(),
            built_at: Instant::now(),
        };
        index.insert("/", IndexEntry::new(ROOT_ID, ObjectKind::Folder));
        index
    }
}

impl PathIndex {
    /// Builds the index from a full listing by walking the parent/child
    /// graph from the root.
    pub fn build(objects: &[ObjectSummary]) -> Self {
        let mut children: HashMap<&str, Vec<&ObjectSummary>> = HashMap::new();
        for object in objects {
            let mut under_root = false;
            for parent in &object.parent_ids {
                under_root |= parent == ROOT_ID;
                children.entry(parent.as_str()).or_default().push(object);
            }
            if object.is_root_child && !under_root {
                children.entry(ROOT_ID).or_default().push(object);
            }
        }

        let mut index = Self::default();
        let mut visited: HashSet<&str> = HashSet::from([ROOT_ID]);
        let mut stack: Vec<(String, &str)> = vec![("/".to_string(), ROOT_ID)];
        while let Some((path, id)) = stack.pop() {
            let Some(kids) = children.get(id) else {
                continue;
            };
            for child in kids {
                if child.title.is_empty() || child.title.contains('/') {
                    continue;
                }
                if visited.contains(child.id.as_str()) {
                    // Second parent, or a cycle reported by the backend.
                    continue;
                }
                let child_path = join(&path, &child.title);
                if index.by_path.contains_key(&child_path) {
                    // Left unvisited so another parent can still place it.
                    warn!(path = %child_path, id = %child.id, "skipping duplicate title");
                    continue;
                }
                visited.insert(child.id.as_str());
                index.insert(&child_path, IndexEntry::new(child.id.clone(), child.kind));
                if child.kind.is_folder() {
                    stack.push((child_path, child.id.as_str()));
                }
            }
        }
        index
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.by_path.get(path)
    }

    pub fn resolve(&self, path: &str) -> Result<&IndexEntry, IndexError> {
        self.get(path)
            .ok_or_else(|| IndexError::NotIndexed(path.to_string()))
    }

    pub fn kind(&self, path: &str) -> Option<ObjectKind> {
        self.get(path).map(|entry| entry.kind)
    }

    pub fn path_of(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn insert(&mut self, path: &str, entry: IndexEntry) {
        if let Some(previous) = self.by_path.get(path) {
            self.by_id.remove(&previous.id);
        }
        self.by_id.insert(entry.id.clone(), path.to_string());
        self.by_path.insert(path.to_string(), entry);
    }

    /// Drops `path` and everything indexed below it.
    pub fn remove(&mut self, path: &str) -> Option<IndexEntry> {
        let removed = self.by_path.remove(path)?;
        self.by_id.remove(&removed.id);
        for (_, entry) in self.take_descendants(path) {
            self.by_id.remove(&entry.id);
        }
        Some(removed)
    }

    /// Moves `old` and its whole subtree to `new`.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), IndexError> {
        let entry = self
            .by_path
            .remove(old)
            .ok_or_else(|| IndexError::NotIndexed(old.to_string()))?;
        let moved = self.take_descendants(old);
        self.insert(new, entry);
        for (path, entry) in moved {
            let suffix = &path[old.len()..];
            self.insert(&format!("{new}{suffix}"), entry);
        }
        Ok(())
    }

    /// Direct children of `dir`, sorted by name.
    pub fn children(&self, dir: &str) -> Vec<(&str, &IndexEntry)> {
        self.descendants(dir)
            .into_iter()
            .filter_map(|(path, entry)| {
                let rest = if dir == "/" {
                    &path[1..]
                } else {
                    &path[dir.len() + 1..]
                };
                (!rest.contains('/')).then_some((rest, entry))
            })
            .collect()
    }

    /// Every indexed path strictly below `dir`, in path order.
    pub fn descendants(&self, dir: &str) -> Vec<(&str, &IndexEntry)> {
        let start = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        self.by_path
            .range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(&start))
            .filter(|(path, _)| is_descendant(dir, path))
            .map(|(path, entry)| (path.as_str(), entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn age(&self) -> Duration {
        self.built_at.elapsed()
    }

    fn take_descendants(&mut self, dir: &str) -> Vec<(String, IndexEntry)> {
        let paths: Vec<String> = self
            .descendants(dir)
            .into_iter()
            .map(|(path, _)| path.to_string())
            .collect();
        paths
            .into_iter()
            .filter_map(|path| self.by_path.remove(&path).map(|entry| (path, entry)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: &str, title: &str, kind: ObjectKind, parents: &[&str], root: bool) -> ObjectSummary {
        ObjectSummary {
            id: id.into(),
            title: title.into(),
            kind,
            parent_ids: parents.iter().map(|p| p.to_string()).collect(),
            is_root_child: root,
        }
    }

    #[test]
    fn build_maps_root_children_and_nested_objects() {
        let index = PathIndex::build(&[
            object("A", "A", ObjectKind::File, &["0Bx"], true),
            object("B", "B", ObjectKind::Folder, &["0Bx"], true),
            object("C", "C", ObjectKind::File, &["B"], false),
        ]);

        assert_eq!(index.resolve("/").unwrap().id, ROOT_ID);
        assert_eq!(index.resolve("/A").unwrap().id, "A");
        assert_eq!(index.resolve("/B").unwrap().id, "B");
        assert_eq!(index.resolve("/B/C").unwrap().id, "C");
        assert_eq!(index.len(), 4);
        assert_eq!(index.path_of("C"), Some("/B/C"));
    }

    #[test]
    fn build_mirrors_nested_listing() {
        let index = PathIndex::build(&[
            object("1APq7o", "file_at_root.txt", ObjectKind::File, &["0B_lkT"], true),
            object("1xp13X", "folder_at_root", ObjectKind::Folder, &["0B_lkT"], true),
            object("13PuVd", "file1_in_folder.txt", ObjectKind::File, &["1xp13X"], false),
            object("1ovGwK", "file2_in_folder.txt", ObjectKind::File, &["1xp13X"], false),
            object("0Ap6n5", "folder_in_folder", ObjectKind::Folder, &["1xp13X"], false),
        ]);

        assert_eq!(index.resolve("/file_at_root.txt").unwrap().id, "1APq7o");
        assert_eq!(index.resolve("/folder_at_root").unwrap().id, "1xp13X");
        assert_eq!(
            index.resolve("/folder_at_root/file1_in_folder.txt").unwrap().id,
            "13PuVd"
        );
        assert_eq!(
            index.resolve("/folder_at_root/file2_in_folder.txt").unwrap().id,
            "1ovGwK"
        );
        assert_eq!(
            index.resolve("/folder_at_root/folder_in_folder").unwrap().kind,
            ObjectKind::Folder
        );
    }

    #[test]
    fn build_skips_untitled_orphaned_and_duplicate_objects() {
        let index = PathIndex::build(&[
            object("a", "", ObjectKind::File, &[ROOT_ID], true),
            object("b", "orphan", ObjectKind::File, &[], false),
            object("c", "dup", ObjectKind::File, &[ROOT_ID], true),
            object("d", "dup", ObjectKind::File, &[ROOT_ID], true),
            object("e", "under-missing", ObjectKind::File, &["gone"], false),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.resolve("/dup").unwrap().id, "c");
        assert_eq!(index.path_of("d"), None);
        assert!(index.get("/orphan").is_none());
    }

    #[test]
    fn duplicate_under_one_parent_is_kept_under_another() {
        let index = PathIndex::build(&[
            object("d1", "dup", ObjectKind::File, &[ROOT_ID], true),
            object("y", "y", ObjectKind::Folder, &[ROOT_ID], true),
            object("d2", "dup", ObjectKind::File, &[ROOT_ID, "y"], true),
        ]);

        assert_eq!(index.resolve("/dup").unwrap().id, "d1");
        assert_eq!(index.resolve("/y/dup").unwrap().id, "d2");
        assert_eq!(index.path_of("d2"), Some("/y/dup"));
    }

    #[test]
    fn build_survives_cycles() {
        let index = PathIndex::build(&[
            object("x", "x", ObjectKind::Folder, &[ROOT_ID, "y"], true),
            object("y", "y", ObjectKind::Folder, &["x"], false),
        ]);

        assert_eq!(index.resolve("/x/y").unwrap().id, "y");
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn resolve_reports_missing_paths() {
        let index = PathIndex::default();
        assert_eq!(
            index.resolve("/missing"),
            Err(IndexError::NotIndexed("/missing".into()))
        );
    }

    #[test]
    fn children_lists_direct_entries_only() {
        let mut index = PathIndex::default();
        index.insert("/a", IndexEntry::new("a", ObjectKind::Folder));
        index.insert("/a/b", IndexEntry::new("b", ObjectKind::Folder));
        index.insert("/a/b/c", IndexEntry::new("c", ObjectKind::File));
        index.insert("/a/d", IndexEntry::new("d", ObjectKind::File));
        index.insert("/ab", IndexEntry::new("ab", ObjectKind::File));

        let names: Vec<_> = index.children("/a").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "d"]);
        let root: Vec<_> = index.children("/").into_iter().map(|(n, _)| n).collect();
        assert_eq!(root, vec!["a", "ab"]);
    }

    #[test]
    fn remove_drops_subtree() {
        let mut index = PathIndex::default();
        index.insert("/a", IndexEntry::new("a", ObjectKind::Folder));
        index.insert("/a/b", IndexEntry::new("b", ObjectKind::File));
        index.insert("/ab", IndexEntry::new("ab", ObjectKind::File));

        let removed = index.remove("/a").unwrap();

        assert_eq!(removed.id, "a");
        assert!(index.get("/a/b").is_none());
        assert_eq!(index.path_of("b"), None);
        assert!(index.get("/ab").is_some());
    }

    #[test]
    fn rename_moves_subtree() {
        let mut index = PathIndex::default();
        index.insert("/a", IndexEntry::new("a", ObjectKind::Folder));
        index.insert("/a/b", IndexEntry::new("b", ObjectKind::Folder));
        index.insert("/a/b/c", IndexEntry::new("c", ObjectKind::File));

        index.rename("/a", "/z").unwrap();

        assert!(index.get("/a").is_none());
        assert_eq!(index.resolve("/z/b/c").unwrap().id, "c");
        assert_eq!(index.path_of("b"), Some("/z/b"));
        assert!(index.rename("/missing", "/other").is_err());
    }
}
