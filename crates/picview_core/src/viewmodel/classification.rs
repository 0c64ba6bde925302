use std::sync::Arc;

use crate::entities::{ImageClassification, ImageId};
use crate::events::{Event, EventBus};
use crate::usecase::ClassifyImageUseCase;

pub struct ClassificationViewModel {
    classify: Arc<ClassifyImageUseCase>,
    current: Option<ImageClassification>,
    events: EventBus,
}

impl ClassificationViewModel {
    pub fn new(classify: Arc<ClassifyImageUseCase>) -> Self {
        Self {
            classify,
            current: None,
            events: EventBus::new(),
        }
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn current_classification(&self) -> Option<&ImageClassification> {
        self.current.as_ref()
    }

    /// Emits `ClassificationStarted`, then `ClassificationChanged` and
    /// `ClassificationCompleted` with the record, or `Error`.
    pub fn classify_image(&mut self, image_id: &ImageId, classifier_type: &str) {
        self.events.emit(&Event::ClassificationStarted(*image_id));
        match self.classify.execute(image_id, classifier_type) {
            Ok(record) => {
                self.current = Some(record.clone());
                self.events.emit(&Event::ClassificationChanged(record.clone()));
                self.events.emit(&Event::ClassificationCompleted(record));
            }
            Err(err) => {
                tracing::warn!("classification of {image_id} failed: {err}");
                self.events.emit(&Event::Error(err.to_string()));
            }
        }
    }
}
