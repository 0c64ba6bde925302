use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::entities::{Image, ImageId};
use crate::events::{Event, EventBus};
use crate::usecase::BrowseFolderUseCase;

/// Page size used when a folder is opened in the main window.
pub const FOLDER_PAGE_SIZE: usize = 1000;

/// Current folder, its images and the selection.
pub struct MainWindowViewModel {
    browse: Arc<BrowseFolderUseCase>,
    folder_path: Option<PathBuf>,
    images: Vec<Image>,
    selected: Option<usize>,
    events: EventBus,
}

impl MainWindowViewModel {
    pub fn new(browse: Arc<BrowseFolderUseCase>) -> Self {
        Self {
            browse,
            folder_path: None,
            images: Vec::new(),
            selected: None,
            events: EventBus::new(),
        }
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn folder_path(&self) -> Option<&Path> {
        self.folder_path.as_deref()
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_image(&self) -> Option<&Image> {
        self.selected.and_then(|idx| self.images.get(idx))
    }

    /// Opens the first page of `path` and clears the selection.
    pub fn load_folder(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match self.browse.execute(path, 0, FOLDER_PAGE_SIZE) {
            Ok(listing) => {
                self.folder_path = Some(path.to_path_buf());
                self.images = listing.images;
                self.selected = None;
                self.events.emit(&Event::FolderChanged(listing.folder));
                self.events.emit(&Event::ImagesLoaded(self.images.clone()));
            }
            Err(err) => {
                tracing::warn!("cannot open folder {}: {err}", path.display());
                self.events.emit(&Event::Error(err.to_string()));
            }
        }
    }

    /// Selects the image with `image_id` if it is in the current folder.
    pub fn select_image(&mut self, image_id: &ImageId) {
        if let Some(idx) = self.images.iter().position(|image| &image.id == image_id) {
            self.select_image_at_index(idx);
        }
    }

    /// Out-of-range indices are ignored.
    pub fn select_image_at_index(&mut self, index: usize) {
        let Some(image) = self.images.get(index) else {
            return;
        };
        let image = image.clone();
        self.selected = Some(index);
        self.events.emit(&Event::ImageSelected(image));
    }

    /// Moves to the next image; with nothing selected this is the first one.
    pub fn next_image(&mut self) {
        let next = self.selected.map_or(0, |idx| idx + 1);
        if next < self.images.len() {
            self.select_image_at_index(next);
        }
    }

    pub fn previous_image(&mut self) {
        if let Some(idx) = self.selected
            && idx > 0
        {
            self.select_image_at_index(idx - 1);
        }
    }
}
