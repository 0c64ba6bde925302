use std::collections::HashMap;
use std::sync::Mutex;

use super::{ClassificationStore, lock};
use crate::entities::{ClassificationId, ImageClassification, ImageId};
use crate::paginate;

#[derive(Default)]
struct Records {
    /// Every saved record in insertion order, superseded ones included.
    all: Vec<ImageClassification>,
    by_id: HashMap<ClassificationId, usize>,
    /// Image -> current record. The only source of truth for "classified".
    current: HashMap<ImageId, ClassificationId>,
}

impl Records {
    fn current_ids(&self, nsfw: bool) -> Vec<ImageId> {
        self.all
            .iter()
            .filter(|record| record.is_nsfw == nsfw)
            .filter(|record| self.current.get(&record.image_id) == Some(&record.id))
            .map(|record| record.image_id)
            .collect()
    }
}

/// In-memory [`ClassificationStore`].
#[derive(Default)]
pub struct InMemoryClassificationStore {
    records: Mutex<Records>,
}

impl InMemoryClassificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClassificationStore for InMemoryClassificationStore {
    fn get_by_image(&self, image_id: &ImageId) -> Option<ImageClassification> {
        let records = lock(&self.records);
        let id = records.current.get(image_id)?;
        let idx = records.by_id.get(id)?;
        records.all.get(*idx).cloned()
    }

    fn get_by_id(&self, id: &ClassificationId) -> Option<ImageClassification> {
        let records = lock(&self.records);
        records.by_id.get(id).and_then(|idx| records.all.get(*idx)).cloned()
    }

    fn save(&self, record: ImageClassification) -> ImageClassification {
        let mut records = lock(&self.records);
        match records.by_id.get(&record.id).copied() {
            Some(idx) => records.all[idx] = record.clone(),
            None => {
                let idx = records.all.len();
                records.by_id.insert(record.id, idx);
                records.all.push(record.clone());
            }
        }
        records.current.insert(record.image_id, record.id);
        record
    }

    fn list_nsfw(&self, page: usize, page_size: usize) -> Vec<ImageId> {
        paginate(&lock(&self.records).current_ids(true), page, page_size)
    }

    fn list_sfw(&self, page: usize, page_size: usize) -> Vec<ImageId> {
        paginate(&lock(&self.records).current_ids(false), page, page_size)
    }

    fn len(&self) -> usize {
        lock(&self.records).current.len()
    }

    fn reset(&self) {
        *lock(&self.records) = Records::default();
    }
}
