use std::path::Path;
use std::sync::Arc;

use crate::entities::{Folder, Image};
use crate::error::BrowserError;
use crate::repository::{FolderRepository, ImageRepository};

/// One page of a folder as shown by the browser.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderListing {
    pub folder: Folder,
    /// Subfolders already known to the folder repository.
    pub subfolders: Vec<Folder>,
    pub images: Vec<Image>,
    pub page: usize,
    pub page_size: usize,
    /// Number of images on this page.
    pub total_images: usize,
}

/// Lists the subfolders and a page of media files of a folder.
pub struct BrowseFolderUseCase {
    folders: Arc<dyn FolderRepository>,
    images: Arc<dyn ImageRepository>,
}

impl BrowseFolderUseCase {
    pub fn new(folders: Arc<dyn FolderRepository>, images: Arc<dyn ImageRepository>) -> Self {
        Self { folders, images }
    }

    pub fn execute(
        &self,
        folder_path: impl AsRef<Path>,
        page: usize,
        page_size: usize,
    ) -> Result<FolderListing, BrowserError> {
        let folder_path = folder_path.as_ref();
        let folder = self
            .folders
            .get_by_path(folder_path)
            .ok_or_else(|| BrowserError::FolderNotFound(folder_path.to_path_buf()))?;

        let subfolders = self.folders.get_subfolders(&folder.id);
        let images = self.images.get_images_in_folder(folder_path, page, page_size);
        tracing::debug!(
            "browsed {} page {page}: {} images, {} subfolders",
            folder_path.display(),
            images.len(),
            subfolders.len()
        );

        Ok(FolderListing {
            folder,
            subfolders,
            total_images: images.len(),
            images,
            page,
            page_size,
        })
    }
}
