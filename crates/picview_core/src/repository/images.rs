use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{ImageRepository, lock};
use crate::entities::{Image, ImageId};
use crate::error::BrowserError;
use crate::fs::{DirectoryLister, MetadataProbe};
use crate::{is_supported_media, paginate};

#[derive(Default)]
struct ImageCache {
    by_id: HashMap<ImageId, Image>,
    by_path: HashMap<PathBuf, ImageId>,
}

impl ImageCache {
    fn lookup_path(&self, path: &Path) -> Option<&Image> {
        self.by_path.get(path).and_then(|id| self.by_id.get(id))
    }

    fn insert(&mut self, image: Image) {
        if let Some(previous) = self.by_path.insert(image.path.clone(), image.id)
            && previous != image.id
        {
            self.by_id.remove(&previous);
        }
        if let Some(old) = self.by_id.insert(image.id, image.clone())
            && old.path != image.path
        {
            self.by_path.remove(&old.path);
        }
    }
}

/// In-memory [`ImageRepository`] that materializes entities via a probe.
///
/// The first materialization of a path wins and is reused for the lifetime
/// of the repository; later changes to the file are not picked up.
pub struct InMemoryImageRepository {
    cache: Mutex<ImageCache>,
    probe: Arc<dyn MetadataProbe>,
    lister: Arc<dyn DirectoryLister>,
}

impl InMemoryImageRepository {
    pub fn new(probe: Arc<dyn MetadataProbe>, lister: Arc<dyn DirectoryLister>) -> Self {
        Self {
            cache: Mutex::new(ImageCache::default()),
            probe,
            lister,
        }
    }

    fn materialize(&self, path: &Path) -> Result<Image, BrowserError> {
        let metadata = self.probe.get_metadata(path)?;
        Ok(Image::from_metadata(ImageId::new(), path, &metadata))
    }
}

impl ImageRepository for InMemoryImageRepository {
    fn get_by_id(&self, id: &ImageId) -> Option<Image> {
        lock(&self.cache).by_id.get(id).cloned()
    }

    fn get_by_path(&self, path: &Path) -> Option<Image> {
        if let Some(image) = lock(&self.cache).lookup_path(path) {
            return Some(image.clone());
        }

        // Probe without holding the lock; a concurrent winner is kept.
        let image = match self.materialize(path) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!("cannot materialize image {}: {err}", path.display());
                return None;
            }
        };
        let mut cache = lock(&self.cache);
        if let Some(existing) = cache.lookup_path(path) {
            return Some(existing.clone());
        }
        cache.insert(image.clone());
        Some(image)
    }

    fn create_from_path(&self, path: &Path) -> Result<Image, BrowserError> {
        // Probe first so unreadable files still fail, even when cached.
        let image = self.materialize(path)?;
        let mut cache = lock(&self.cache);
        if let Some(existing) = cache.lookup_path(path) {
            return Ok(existing.clone());
        }
        cache.insert(image.clone());
        Ok(image)
    }

    fn get_images_in_folder(&self, folder: &Path, page: usize, page_size: usize) -> Vec<Image> {
        let entries = match self.lister.list_directory(folder) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("cannot list {}: {err}", folder.display());
                return Vec::new();
            }
        };

        let images: Vec<Image> = entries
            .iter()
            .filter(|entry| !entry.is_directory && is_supported_media(&entry.path))
            .filter_map(|entry| self.get_by_path(&entry.path))
            .collect();
        paginate(&images, page, page_size)
    }

    fn save(&self, image: Image) -> Image {
        lock(&self.cache).insert(image.clone());
        image
    }

    fn delete(&self, id: &ImageId) -> bool {
        let mut cache = lock(&self.cache);
        match cache.by_id.remove(id) {
            Some(image) => {
                cache.by_path.remove(&image.path);
                true
            }
            None => false,
        }
    }

    fn search(&self, query: &str) -> Vec<Image> {
        let query = query.to_lowercase();
        let cache = lock(&self.cache);
        let mut found: Vec<Image> = cache
            .by_id
            .values()
            .filter(|image| image.filename.to_lowercase().contains(&query))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }
}
