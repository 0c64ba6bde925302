//! Cache-or-materialize stores for images and folders, and the
//! classification store.
//!
//! Every store keeps its maps behind one `Mutex` so it can be shared through
//! an `Arc`. Calls still run to completion on the caller's thread, and two
//! racing classifications of the same image both write (last one wins).

use std::path::Path;

use crate::entities::{
    ClassificationId, Folder, FolderId, Image, ImageClassification, ImageId,
};
use crate::error::BrowserError;
use crate::lock;

mod classifications;
mod folders;
mod images;

pub use classifications::InMemoryClassificationStore;
pub use folders::InMemoryFolderRepository;
pub use images::InMemoryImageRepository;

/// Path-keyed cache of [`Image`] entities.
pub trait ImageRepository: Send + Sync {
    fn get_by_id(&self, id: &ImageId) -> Option<Image>;

    /// Returns the cached image for `path` or materializes it.
    ///
    /// Probe failures are logged and reported as `None`.
    fn get_by_path(&self, path: &Path) -> Option<Image>;

    /// Probes `path` and propagates probe errors. A path that is already
    /// cached keeps its existing entity and identity.
    fn create_from_path(&self, path: &Path) -> Result<Image, BrowserError>;

    /// Supported media files directly inside `folder`, paged after listing.
    fn get_images_in_folder(&self, folder: &Path, page: usize, page_size: usize) -> Vec<Image>;

    fn save(&self, image: Image) -> Image;

    /// Removes the image; returns false if the id was unknown.
    fn delete(&self, id: &ImageId) -> bool;

    /// Case-insensitive filename match over cached images only.
    fn search(&self, query: &str) -> Vec<Image>;
}

/// Path-keyed cache of [`Folder`] entities with lazily resolved parents.
pub trait FolderRepository: Send + Sync {
    fn get_by_id(&self, id: &FolderId) -> Option<Folder>;

    /// Returns the cached folder for `path` or materializes it together with
    /// its ancestors. Paths that are not directories yield `None`.
    fn get_by_path(&self, path: &Path) -> Option<Folder>;

    /// Cached folders whose parent is `parent_id`.
    fn get_subfolders(&self, parent_id: &FolderId) -> Vec<Folder>;

    fn save(&self, folder: Folder) -> Folder;
}

/// Memoized classification results keyed by image identity.
pub trait ClassificationStore: Send + Sync {
    /// The current record for `image_id`, if any.
    fn get_by_image(&self, image_id: &ImageId) -> Option<ImageClassification>;

    fn get_by_id(&self, id: &ClassificationId) -> Option<ImageClassification>;

    /// Stores `record` and makes it the current one for its image.
    fn save(&self, record: ImageClassification) -> ImageClassification;

    /// Image ids whose current record is NSFW, paged.
    ///
    /// Only the record the image index points at is listed. Records
    /// superseded by a later `save` for the same image are skipped, so an
    /// image never appears twice or in both listings.
    fn list_nsfw(&self, page: usize, page_size: usize) -> Vec<ImageId>;

    /// Image ids whose current record is not NSFW, paged. Superseded records
    /// are skipped as in [`ClassificationStore::list_nsfw`].
    fn list_sfw(&self, page: usize, page_size: usize) -> Vec<ImageId>;

    /// Number of images with a current record.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every record.
    fn reset(&self);
}
