use std::sync::Arc;

use crate::classifier::ClassifierSet;
use crate::entities::{ImageClassification, ImageId};
use crate::error::BrowserError;
use crate::repository::{ClassificationStore, ImageRepository};

/// Classifies an image at most once and stores the result.
///
/// Results are memoized per image, not per strategy: once an image has a
/// record, asking again with another tag returns that same record.
pub struct ClassifyImageUseCase {
    images: Arc<dyn ImageRepository>,
    classifications: Arc<dyn ClassificationStore>,
    classifiers: Arc<ClassifierSet>,
}

impl ClassifyImageUseCase {
    pub fn new(
        images: Arc<dyn ImageRepository>,
        classifications: Arc<dyn ClassificationStore>,
        classifiers: Arc<ClassifierSet>,
    ) -> Self {
        Self {
            images,
            classifications,
            classifiers,
        }
    }

    /// Returns the stored classification or computes one with the strategy
    /// selected by `classifier_type`.
    ///
    /// # Errors
    ///
    /// [`BrowserError::ImageNotFound`] when `image_id` is not in the image
    /// repository. Model failures are never reported here.
    pub fn execute(
        &self,
        image_id: &ImageId,
        classifier_type: &str,
    ) -> Result<ImageClassification, BrowserError> {
        let image = self
            .images
            .get_by_id(image_id)
            .ok_or_else(|| BrowserError::ImageNotFound(image_id.to_string()))?;

        if let Some(existing) = self.classifications.get_by_image(image_id) {
            return Ok(existing);
        }

        let classifier = self.classifiers.select(classifier_type);
        tracing::debug!("classifying {} with {}", image.filename, classifier.kind());
        let record = classifier.classify(&image);
        Ok(self.classifications.save(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{
        AlternateModelClassifier, ClassScorer, HeuristicClassifier, RegionDetect,
        RegionDetectorClassifier,
    };
    use crate::entities::{ClassificationMethod, Image};
    use crate::repository::{InMemoryClassificationStore, InMemoryImageRepository};
    use crate::fs::FileSystem;
    use anyhow::Result;
    use image::{Rgb, RgbImage};
    use std::path::Path;
    use tempfile::tempdir;

    fn classifier_set() -> ClassifierSet {
        ClassifierSet::from_parts(
            RegionDetectorClassifier::with_loader(|| -> Result<Box<dyn RegionDetect>> {
                anyhow::bail!("no detector in tests")
            }),
            HeuristicClassifier,
            AlternateModelClassifier::with_loader(
                ["hentai".into(), "porn".into(), "sexy".into()],
                || -> Result<Box<dyn ClassScorer>> { anyhow::bail!("no model in tests") },
            ),
        )
    }

    struct Fixture {
        images: Arc<InMemoryImageRepository>,
        store: Arc<InMemoryClassificationStore>,
        use_case: ClassifyImageUseCase,
    }

    fn fixture() -> Fixture {
        let fs = Arc::new(FileSystem::new());
        let images = Arc::new(InMemoryImageRepository::new(fs.clone(), fs));
        let store = Arc::new(InMemoryClassificationStore::new());
        let use_case =
            ClassifyImageUseCase::new(images.clone(), store.clone(), Arc::new(classifier_set()));
        Fixture {
            images,
            store,
            use_case,
        }
    }

    fn png(dir: &Path, name: &str) -> Result<std::path::PathBuf> {
        let path = dir.join(name);
        RgbImage::from_pixel(16, 16, Rgb([30, 90, 200])).save(&path)?;
        Ok(path)
    }

    fn cached(fixture: &Fixture, path: &Path) -> Image {
        fixture.images.get_by_path(path).unwrap()
    }

    #[test]
    fn second_call_returns_the_stored_record() -> Result<()> {
        let dir = tempdir()?;
        let fx = fixture();
        let image = cached(&fx, &png(dir.path(), "sky.png")?);

        let first = fx.use_case.execute(&image.id, "simple")?;
        let second = fx.use_case.execute(&image.id, "simple")?;
        assert_eq!(first.id, second.id);
        assert_eq!(fx.store.len(), 1);
        Ok(())
    }

    #[test]
    fn memoization_ignores_the_requested_strategy() -> Result<()> {
        let dir = tempdir()?;
        let fx = fixture();
        let image = cached(&fx, &png(dir.path(), "sky.png")?);

        let first = fx.use_case.execute(&image.id, "simple")?;
        let second = fx.use_case.execute(&image.id, "nudenet")?;
        assert_eq!(second, first);
        assert_eq!(second.classification_method, ClassificationMethod::Heuristic);
        Ok(())
    }

    #[test]
    fn model_failures_surface_only_as_method_tags() -> Result<()> {
        let dir = tempdir()?;
        let fx = fixture();
        let a = cached(&fx, &png(dir.path(), "adult_a.png")?);
        let b = cached(&fx, &png(dir.path(), "b.png")?);

        let region = fx.use_case.execute(&a.id, "default")?;
        assert_eq!(region.classification_method, ClassificationMethod::Fallback);
        assert!(region.is_nsfw);

        let alternate = fx.use_case.execute(&b.id, "tensorflow")?;
        assert_eq!(alternate.classification_method, ClassificationMethod::Error);
        assert_eq!(alternate.nsfw_score, 0.0);
        Ok(())
    }

    #[test]
    fn reset_store_allows_a_new_record() -> Result<()> {
        let dir = tempdir()?;
        let fx = fixture();
        let image = cached(&fx, &png(dir.path(), "sky.png")?);

        let first = fx.use_case.execute(&image.id, "simple")?;
        fx.store.reset();
        let second = fx.use_case.execute(&image.id, "nudenet")?;
        assert_ne!(first.id, second.id);
        assert_eq!(second.classification_method, ClassificationMethod::Fallback);
        Ok(())
    }

    #[test]
    fn unknown_image_is_not_found() {
        let fx = fixture();
        let err = fx.use_case.execute(&ImageId::new(), "simple").unwrap_err();
        assert!(matches!(err, BrowserError::ImageNotFound(_)));
        assert!(err.is_not_found());
        assert!(fx.store.is_empty());
    }
}
