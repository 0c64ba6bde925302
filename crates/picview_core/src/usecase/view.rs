use std::path::Path;
use std::sync::Arc;

use crate::entities::{Image, ImageId};
use crate::error::BrowserError;
use crate::repository::ImageRepository;

/// Resolves a single image for display.
pub struct ViewImageUseCase {
    images: Arc<dyn ImageRepository>,
}

impl ViewImageUseCase {
    pub fn new(images: Arc<dyn ImageRepository>) -> Self {
        Self { images }
    }

    pub fn execute(&self, image_id: &ImageId) -> Result<Image, BrowserError> {
        self.images
            .get_by_id(image_id)
            .ok_or_else(|| BrowserError::ImageNotFound(image_id.to_string()))
    }

    /// Looks the image up by path, materializing it on first access.
    pub fn execute_by_path(&self, path: impl AsRef<Path>) -> Result<Image, BrowserError> {
        let path = path.as_ref();
        self.images
            .get_by_path(path)
            .ok_or_else(|| BrowserError::ImageNotFound(path.display().to_string()))
    }
}
