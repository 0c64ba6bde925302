use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{FolderRepository, lock};
use crate::entities::{Folder, FolderId};
use crate::fs::DirectoryLister;

#[derive(Default)]
struct FolderCache {
    by_id: HashMap<FolderId, Folder>,
    by_path: HashMap<PathBuf, FolderId>,
}

impl FolderCache {
    fn lookup_path(&self, path: &Path) -> Option<&Folder> {
        self.by_path.get(path).and_then(|id| self.by_id.get(id))
    }

    fn insert(&mut self, folder: Folder) {
        if let Some(previous) = self.by_path.insert(folder.path.clone(), folder.id)
            && previous != folder.id
        {
            self.by_id.remove(&previous);
        }
        self.by_id.insert(folder.id, folder);
    }
}

/// In-memory [`FolderRepository`].
///
/// Materializing a folder first resolves its parent path, so the whole
/// ancestor chain is cached before the child. Folders are never evicted.
pub struct InMemoryFolderRepository {
    cache: Mutex<FolderCache>,
    lister: Arc<dyn DirectoryLister>,
}

impl InMemoryFolderRepository {
    pub fn new(lister: Arc<dyn DirectoryLister>) -> Self {
        Self {
            cache: Mutex::new(FolderCache::default()),
            lister,
        }
    }

    fn materialize(&self, path: &Path) -> Option<Folder> {
        if !self.lister.is_directory(path) {
            tracing::warn!("not a directory: {}", path.display());
            return None;
        }

        let parent_id = parent_path(path)
            .and_then(|parent| self.get_by_path(parent))
            .map(|parent| parent.id);

        Some(Folder {
            id: FolderId::new(),
            path: path.to_path_buf(),
            name: folder_name(path),
            parent_id,
        })
    }
}

impl FolderRepository for InMemoryFolderRepository {
    fn get_by_id(&self, id: &FolderId) -> Option<Folder> {
        lock(&self.cache).by_id.get(id).cloned()
    }

    fn get_by_path(&self, path: &Path) -> Option<Folder> {
        if let Some(folder) = lock(&self.cache).lookup_path(path) {
            return Some(folder.clone());
        }

        let folder = self.materialize(path)?;
        let mut cache = lock(&self.cache);
        if let Some(existing) = cache.lookup_path(path) {
            return Some(existing.clone());
        }
        cache.insert(folder.clone());
        Some(folder)
    }

    fn get_subfolders(&self, parent_id: &FolderId) -> Vec<Folder> {
        let cache = lock(&self.cache);
        let mut children: Vec<Folder> = cache
            .by_id
            .values()
            .filter(|folder| folder.parent_id.as_ref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        children
    }

    fn save(&self, folder: Folder) -> Folder {
        lock(&self.cache).insert(folder.clone());
        folder
    }
}

/// The parent directory of `path`, or `None` at a filesystem root.
fn parent_path(path: &Path) -> Option<&Path> {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty() && *parent != path)
}

fn folder_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}
