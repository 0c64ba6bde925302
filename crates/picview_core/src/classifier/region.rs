use anyhow::{Context, Result};
use candle_core::{D, DType, Device, Tensor};
use candle_nn::{self as nn, Func, Module, VarBuilder};
use candle_transformers::models::efficientvit;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::preprocess::image_tensor_data;
use super::slot::ModelSlot;
use super::{FALLBACK_KEYWORDS, filename_has_keyword};
use crate::config::RegionDetectorConfig;
use crate::entities::{ClassificationMethod, Image, ImageClassification};
use crate::lock;

const FALLBACK_NSFW_SCORE: f32 = 0.8;
const FALLBACK_SFW_SCORE: f32 = 0.2;

/// A region reported by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f32,
    /// `[x, y, width, height]` in source pixels.
    pub bbox: [u32; 4],
}

/// Backend that finds exposed regions in an image file.
pub trait RegionDetect: Send {
    fn detect(&mut self, path: &Path) -> Result<Vec<Detection>>;
}

type DetectorLoader = Arc<dyn Fn() -> Result<Box<dyn RegionDetect>> + Send + Sync>;

/// Strategy that scores an image by its most confident detected region.
///
/// The detector is loaded on the first call. If loading or detection fails
/// the result comes from [`RegionDetectorClassifier::fallback`] instead.
pub struct RegionDetectorClassifier {
    loader: DetectorLoader,
    model: Mutex<ModelSlot<Box<dyn RegionDetect>>>,
}

impl RegionDetectorClassifier {
    /// Strategy backed by [`TiledEfficientVit`] built from `config`.
    pub fn new(config: RegionDetectorConfig) -> Self {
        Self::with_loader(move || {
            let detector = TiledEfficientVit::load(&config)?;
            Ok(Box::new(detector) as Box<dyn RegionDetect>)
        })
    }

    /// Strategy backed by whatever detector `loader` produces.
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn RegionDetect>> + Send + Sync + 'static,
    {
        Self {
            loader: Arc::new(loader),
            model: Mutex::new(ModelSlot::Unloaded),
        }
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.model).is_loaded()
    }

    pub fn classify(&self, image: &Image) -> ImageClassification {
        match self.detect(&image.path) {
            Ok(detections) => {
                let nsfw_score = detections
                    .iter()
                    .map(|detection| detection.score)
                    .fold(0.0f32, f32::max);
                tracing::debug!(
                    "region detector found {} regions in {} with max score {nsfw_score:.3}",
                    detections.len(),
                    image.filename
                );
                ImageClassification::from_score(
                    image.id,
                    nsfw_score,
                    ClassificationMethod::RegionDetector,
                )
            }
            Err(err) => {
                tracing::warn!(
                    "region detector failed for {}, using filename fallback: {err:#}",
                    image.path.display()
                );
                Self::fallback(image)
            }
        }
    }

    /// Filename-only verdict used when the detector is unavailable.
    pub fn fallback(image: &Image) -> ImageClassification {
        let score = if filename_has_keyword(&image.filename, &FALLBACK_KEYWORDS) {
            FALLBACK_NSFW_SCORE
        } else {
            FALLBACK_SFW_SCORE
        };
        ImageClassification::from_score(image.id, score, ClassificationMethod::Fallback)
    }

    fn detect(&self, path: &Path) -> Result<Vec<Detection>> {
        let mut slot = lock(&self.model);
        let detector = slot.get_or_load(|| {
            let detector = (self.loader)()?;
            tracing::info!("region detector loaded");
            Ok(detector)
        })?;
        detector.detect(path)
    }
}

/// EfficientViT classifier evaluated on the full frame and a grid of tiles.
///
/// Every tile whose top label is one of the configured NSFW labels with at
/// least `min_confidence` probability is reported as a region.
pub struct TiledEfficientVit {
    model: Func<'static>,
    device: Device,
    labels: Vec<String>,
    nsfw_labels: Vec<String>,
    input_size: u32,
    grid: u32,
    min_confidence: f32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl TiledEfficientVit {
    /// Loads the model weights and labels.
    ///
    /// # Errors
    ///
    /// Returns an error when the model or label files are missing or cannot
    /// be parsed, or when the tensors fail to load.
    pub fn load(cfg: &RegionDetectorConfig) -> Result<Self> {
        if !cfg.model_path.exists() {
            anyhow::bail!("model file missing: {}", cfg.model_path.display());
        }
        if !cfg.labels_path.exists() {
            anyhow::bail!("labels file missing: {}", cfg.labels_path.display());
        }
        let labels = read_labels(&cfg.labels_path)?;

        let device = Device::Cpu;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                std::slice::from_ref(&cfg.model_path),
                DType::F32,
                &device,
            )?
        };
        let model = efficientvit::efficientvit(&cfg.variant.config(), labels.len(), vb)?;

        Ok(Self {
            model,
            device,
            labels,
            nsfw_labels: cfg
                .nsfw_labels
                .iter()
                .map(|label| label.to_ascii_lowercase())
                .collect(),
            input_size: cfg.input_size,
            grid: cfg.grid.max(1),
            min_confidence: cfg.min_confidence,
            mean: cfg.mean,
            std: cfg.std,
        })
    }

    fn tensor_from_data(&self, data: Vec<f32>) -> Result<Tensor> {
        Ok(Tensor::from_vec(
            data,
            (3, self.input_size as usize, self.input_size as usize),
            &self.device,
        )?)
    }

    fn detection_from_probs(&self, probs: &[f32], bbox: [u32; 4]) -> Option<Detection> {
        let (best_idx, &best_prob) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        let label = self.labels.get(best_idx)?;
        let is_nsfw = self.nsfw_labels.iter().any(|l| l == &label.to_ascii_lowercase());
        (is_nsfw && best_prob >= self.min_confidence).then(|| Detection {
            label: label.clone(),
            score: best_prob,
            bbox,
        })
    }
}

impl RegionDetect for TiledEfficientVit {
    fn detect(&mut self, path: &Path) -> Result<Vec<Detection>> {
        let img = image::open(path).with_context(|| format!("cannot decode {}", path.display()))?;
        let boxes = tile_boxes(img.width(), img.height(), self.grid);

        let mut tensors = Vec::with_capacity(boxes.len());
        for &[x, y, w, h] in &boxes {
            let crop = img.crop_imm(x, y, w, h);
            let data = image_tensor_data(crop, self.input_size, self.mean, self.std)?;
            tensors.push(self.tensor_from_data(data)?);
        }

        let views = tensors.iter().collect::<Vec<_>>();
        let batch = Tensor::stack(&views, 0)?;
        let logits = self.model.forward(&batch)?;
        let probs = nn::ops::softmax(&logits, D::Minus1)?;
        let rows = probs.to_vec2::<f32>()?;

        Ok(rows
            .iter()
            .zip(boxes)
            .filter_map(|(row, bbox)| self.detection_from_probs(row, bbox))
            .collect())
    }
}

/// The full frame followed by a `grid x grid` split. Tiles at the right and
/// bottom edges absorb the remainder.
fn tile_boxes(width: u32, height: u32, grid: u32) -> Vec<[u32; 4]> {
    let mut boxes = vec![[0, 0, width, height]];
    if grid <= 1 || width < grid || height < grid {
        return boxes;
    }
    let (tile_w, tile_h) = (width / grid, height / grid);
    for row in 0..grid {
        for col in 0..grid {
            let x = col * tile_w;
            let y = row * tile_h;
            let w = if col + 1 == grid { width - x } else { tile_w };
            let h = if row + 1 == grid { height - y } else { tile_h };
            boxes.push([x, y, w, h]);
        }
    }
    boxes
}

/// Reads one label per line, keeping the first CSV column.
fn read_labels(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path).context("labels unreadable")?;
    let mut labels: Vec<String> = raw
        .lines()
        .map(|line| {
            let trimmed = line.trim();
            trimmed
                .split_once(',')
                .map(|(first, _)| first.trim())
                .unwrap_or(trimmed)
                .to_string()
        })
        .filter(|label| !label.is_empty())
        .collect();
    if labels.is_empty() {
        anyhow::bail!("labels file contains no labels");
    }
    labels.dedup();
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ImageId;
    use chrono::Local;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetector(Vec<f32>);

    impl RegionDetect for FixedDetector {
        fn detect(&mut self, _path: &Path) -> Result<Vec<Detection>> {
            Ok(self
                .0
                .iter()
                .map(|&score| Detection {
                    label: "exposed_breast".into(),
                    score,
                    bbox: [0, 0, 1, 1],
                })
                .collect())
        }
    }

    struct BrokenDetector;

    impl RegionDetect for BrokenDetector {
        fn detect(&mut self, _path: &Path) -> Result<Vec<Detection>> {
            anyhow::bail!("inference exploded")
        }
    }

    fn image_named(name: &str) -> Image {
        let now = Local::now();
        Image {
            id: ImageId::new(),
            path: PathBuf::from("/nowhere").join(name),
            filename: name.to_string(),
            file_type: "jpg".into(),
            size: 0,
            width: 0,
            height: 0,
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn score_is_the_max_region_confidence() {
        let classifier = RegionDetectorClassifier::with_loader(|| {
            Ok(Box::new(FixedDetector(vec![0.3, 0.91, 0.6])) as Box<dyn RegionDetect>)
        });
        let record = classifier.classify(&image_named("a.jpg"));
        assert_eq!(record.classification_method, ClassificationMethod::RegionDetector);
        assert!((record.nsfw_score - 0.91).abs() < 1e-6);
        assert!(record.is_nsfw);
    }

    #[test]
    fn no_regions_means_safe() {
        let classifier = RegionDetectorClassifier::with_loader(|| {
            Ok(Box::new(FixedDetector(Vec::new())) as Box<dyn RegionDetect>)
        });
        let record = classifier.classify(&image_named("nsfw.jpg"));
        assert_eq!(record.nsfw_score, 0.0);
        assert!(!record.is_nsfw);
    }

    #[test]
    fn load_failure_falls_back_to_filename() {
        let classifier =
            RegionDetectorClassifier::with_loader(|| anyhow::bail!("weights not found"));

        let flagged = classifier.classify(&image_named("holiday_NUDE.jpg"));
        assert_eq!(flagged.classification_method, ClassificationMethod::Fallback);
        assert_eq!(flagged.nsfw_score, 0.8);
        assert!(flagged.is_nsfw);

        let clean = classifier.classify(&image_named("holiday.jpg"));
        assert_eq!(clean.classification_method, ClassificationMethod::Fallback);
        assert_eq!(clean.nsfw_score, 0.2);
        assert!(!clean.is_nsfw);
        assert!(!classifier.is_loaded());
    }

    #[test]
    fn detection_failure_falls_back_too() {
        let classifier = RegionDetectorClassifier::with_loader(|| {
            Ok(Box::new(BrokenDetector) as Box<dyn RegionDetect>)
        });
        let record = classifier.classify(&image_named("xxx.jpg"));
        assert_eq!(record.classification_method, ClassificationMethod::Fallback);
        assert!(record.is_nsfw);
    }

    #[test]
    fn model_loads_once_and_failed_loads_are_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let classifier = RegionDetectorClassifier::with_loader(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("first load fails");
            }
            Ok(Box::new(FixedDetector(vec![0.4])) as Box<dyn RegionDetect>)
        });

        let first = classifier.classify(&image_named("a.jpg"));
        assert_eq!(first.classification_method, ClassificationMethod::Fallback);
        let second = classifier.classify(&image_named("a.jpg"));
        assert_eq!(second.classification_method, ClassificationMethod::RegionDetector);
        classifier.classify(&image_named("b.jpg"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(classifier.is_loaded());
    }

    #[test]
    fn default_backend_without_weights_uses_fallback() {
        let config = crate::config::ClassifierConfig::with_models_dir("/definitely/missing");
        let classifier = RegionDetectorClassifier::new(config.region);
        let record = classifier.classify(&image_named("adult.jpg"));
        assert_eq!(record.classification_method, ClassificationMethod::Fallback);
        assert!(record.is_nsfw);
    }

    #[test]
    fn tiles_cover_the_frame() {
        let boxes = tile_boxes(10, 7, 3);
        assert_eq!(boxes.len(), 10);
        assert_eq!(boxes[0], [0, 0, 10, 7]);
        assert_eq!(boxes[9], [6, 4, 4, 3]);
        let area: u32 = boxes[1..].iter().map(|b| b[2] * b[3]).sum();
        assert_eq!(area, 70);
        assert_eq!(tile_boxes(2, 2, 3), vec![[0, 0, 2, 2]]);
    }

    #[test]
    fn labels_keep_first_column() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("labels.csv");
        fs::write(&path, "covered,extra\nexposed_breast\n\nexposed_breast\n")?;
        assert_eq!(read_labels(&path)?, vec!["covered", "exposed_breast"]);
        fs::write(&path, "\n\n")?;
        assert!(read_labels(&path).is_err());
        Ok(())
    }
}
