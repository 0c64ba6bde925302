use std::path::Path;
use std::sync::Arc;

use crate::entities::{Image, ImageId};
use crate::error::BrowserError;
use crate::events::{Event, EventBus};
use crate::usecase::ViewImageUseCase;

const ZOOM_STEP: f32 = 1.2;
const MAX_ZOOM: f32 = 5.0;
const MIN_ZOOM: f32 = 0.1;

/// Zoom and rotation state of the single-image view.
pub struct ImageViewModel {
    view: Arc<ViewImageUseCase>,
    current: Option<Image>,
    zoom: f32,
    rotation: u16,
    events: EventBus,
}

impl ImageViewModel {
    pub fn new(view: Arc<ViewImageUseCase>) -> Self {
        Self {
            view,
            current: None,
            zoom: 1.0,
            rotation: 0,
            events: EventBus::new(),
        }
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn current_image(&self) -> Option<&Image> {
        self.current.as_ref()
    }

    pub fn zoom_level(&self) -> f32 {
        self.zoom
    }

    /// Degrees clockwise, one of 0, 90, 180 or 270.
    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    pub fn load_image(&mut self, image_id: &ImageId) {
        let result = self.view.execute(image_id);
        self.apply_loaded(result);
    }

    pub fn load_image_by_path(&mut self, path: impl AsRef<Path>) {
        let result = self.view.execute_by_path(path);
        self.apply_loaded(result);
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
        self.events.emit(&Event::ZoomChanged(self.zoom));
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_STEP).max(MIN_ZOOM);
        self.events.emit(&Event::ZoomChanged(self.zoom));
    }

    pub fn rotate_clockwise(&mut self) {
        self.rotation = (self.rotation + 90) % 360;
        self.events.emit(&Event::RotationChanged(self.rotation));
    }

    pub fn rotate_counterclockwise(&mut self) {
        self.rotation = (self.rotation + 270) % 360;
        self.events.emit(&Event::RotationChanged(self.rotation));
    }

    pub fn reset_view(&mut self) {
        self.zoom = 1.0;
        self.rotation = 0;
        self.events.emit(&Event::ZoomChanged(self.zoom));
        self.events.emit(&Event::RotationChanged(self.rotation));
    }

    fn apply_loaded(&mut self, result: Result<Image, BrowserError>) {
        match result {
            Ok(image) => {
                self.zoom = 1.0;
                self.rotation = 0;
                self.current = Some(image.clone());
                self.events.emit(&Event::ImageLoaded(image));
            }
            Err(err) => self.events.emit(&Event::Error(err.to_string())),
        }
    }
}
