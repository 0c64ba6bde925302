//! # picview_core
//!
//! `picview_core` holds everything behind the picview browser that is not a
//! widget: the entities, the lazily materializing repositories, the
//! classification store, the NSFW classifier strategies and the use cases and
//! view models that tie them together. This crate is kept UI-free so the CLI
//! and any future frontend can reuse the same pipeline.
//!
//! ## Examples
//!
//! ```no_run
//! use picview_core::{AppContainer, AppSettings, ClassifierConfig};
//!
//! # fn run() -> anyhow::Result<()> {
//! let container = AppContainer::new(AppSettings::default(), ClassifierConfig::default());
//! let listing = container.browse_folder().execute("/path/to/images", 0, 100)?;
//! for image in &listing.images {
//!     let record = container.classify_image().execute(&image.id, "simple")?;
//!     println!("{} -> {:.2}", image.filename, record.nsfw_score);
//! }
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```

pub mod classifier;
pub mod config;
pub mod container;
pub mod entities;
pub mod error;
pub mod events;
pub mod export;
pub mod fs;
pub mod repository;
pub mod usecase;
pub mod viewmodel;

pub use classifier::{Classifier, ClassifierKind, ClassifierSet};
pub use config::{AppSettings, ClassifierConfig};
pub use container::AppContainer;
pub use entities::{
    ClassificationId, ClassificationMethod, Folder, FolderId, Image, ImageClassification, ImageId,
};
pub use error::{BrowserError, ProbeError};
pub use events::{Event, EventBus, SubscriptionId, Topic};
pub use export::export_csv;
pub use fs::{DirEntryInfo, DirectoryLister, FileSystem, MediaMetadata, MetadataProbe};
pub use repository::{
    ClassificationStore, FolderRepository, ImageRepository, InMemoryClassificationStore,
    InMemoryFolderRepository, InMemoryImageRepository,
};
pub use usecase::{BrowseFolderUseCase, ClassifyImageUseCase, FolderListing, ViewImageUseCase};
pub use viewmodel::{ClassificationViewModel, ImageViewModel, MainWindowViewModel};

/// Extensions (lowercase, without dot) the browser lists and materializes.
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "mp4"];

/// File type tag used for video files.
pub const VIDEO_FILE_TYPE: &str = "mp4";

/// Returns true when the file extension is one the browser can show.
pub fn is_supported_media(path: &std::path::Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Slices `items` into the requested page.
///
/// Pages are not validated: a page past the end yields an empty vector and the
/// last page may be partial.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Vec<T> {
    let start = page.saturating_mul(page_size);
    if start >= items.len() {
        return Vec::new();
    }
    let end = start.saturating_add(page_size).min(items.len());
    items[start..end].to_vec()
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
