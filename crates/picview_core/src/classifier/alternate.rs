use anyhow::{Context, Result};
use candle_core::{D, DType, Device, Tensor};
use candle_nn::{self as nn, VarBuilder};
use candle_transformers::models::vit;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::preprocess::load_image_tensor_data;
use super::slot::ModelSlot;
use crate::config::AlternateModelConfig;
use crate::entities::{ClassificationMethod, Image, ImageClassification};
use crate::lock;

/// Backend returning a probability per output class.
pub trait ClassScorer: Send {
    fn class_scores(&mut self, path: &Path) -> Result<HashMap<String, f32>>;
}

type ScorerLoader = Arc<dyn Fn() -> Result<Box<dyn ClassScorer>> + Send + Sync>;

/// Strategy that sums the probabilities of the NSFW classes of a moderation
/// classifier. Failures produce an `error` record; there is no fallback.
pub struct AlternateModelClassifier {
    nsfw_classes: [String; 3],
    loader: ScorerLoader,
    model: Mutex<ModelSlot<Box<dyn ClassScorer>>>,
}

impl AlternateModelClassifier {
    /// Strategy backed by [`VitModerationModel`] built from `config`.
    pub fn new(config: AlternateModelConfig) -> Self {
        let nsfw_classes = config.nsfw_classes.clone();
        Self::with_loader(nsfw_classes, move || {
            let model = VitModerationModel::load(&config)?;
            Ok(Box::new(model) as Box<dyn ClassScorer>)
        })
    }

    pub fn with_loader<F>(nsfw_classes: [String; 3], loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ClassScorer>> + Send + Sync + 'static,
    {
        Self {
            nsfw_classes,
            loader: Arc::new(loader),
            model: Mutex::new(ModelSlot::Unloaded),
        }
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.model).is_loaded()
    }

    pub fn classify(&self, image: &Image) -> ImageClassification {
        match self.score(&image.path) {
            Ok(score) => {
                tracing::debug!("alternate model {}: score={score:.3}", image.filename);
                ImageClassification::from_score(image.id, score, ClassificationMethod::AlternateModel)
            }
            Err(err) => {
                tracing::warn!(
                    "alternate model failed for {}: {err:#}",
                    image.path.display()
                );
                ImageClassification::error(image.id)
            }
        }
    }

    fn score(&self, path: &Path) -> Result<f32> {
        let mut slot = lock(&self.model);
        let scorer = slot.get_or_load(|| {
            let scorer = (self.loader)()?;
            tracing::info!("alternate model loaded");
            Ok(scorer)
        })?;
        let scores = scorer.class_scores(path)?;
        let total: f32 = self
            .nsfw_classes
            .iter()
            .map(|class| scores.get(class).copied().unwrap_or(0.0))
            .sum();
        Ok(total.min(1.0))
    }
}

/// Five-class ViT image moderation model loaded from a local directory
/// containing `config.json` and `model.safetensors`.
pub struct VitModerationModel {
    model: vit::Model,
    device: Device,
    labels: Vec<String>,
    input_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl VitModerationModel {
    pub fn load(cfg: &AlternateModelConfig) -> Result<Self> {
        let config_path = cfg.model_dir.join("config.json");
        let weights_path = cfg.model_dir.join("model.safetensors");
        if !weights_path.exists() {
            anyhow::bail!("model file missing: {}", weights_path.display());
        }
        let raw = fs::read_to_string(&config_path)
            .with_context(|| format!("cannot read {}", config_path.display()))?;
        let config: vit::Config = serde_json::from_str(&raw).context("invalid ViT config")?;

        let device = Device::Cpu;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)? };
        let model = vit::Model::new(&config, cfg.labels.len(), vb)?;

        Ok(Self {
            model,
            device,
            labels: cfg.labels.clone(),
            input_size: cfg.input_size,
            mean: cfg.mean,
            std: cfg.std,
        })
    }
}

impl ClassScorer for VitModerationModel {
    fn class_scores(&mut self, path: &Path) -> Result<HashMap<String, f32>> {
        let size = self.input_size as usize;
        let data = load_image_tensor_data(path, self.input_size, self.mean, self.std)?;
        let input = Tensor::from_vec(data, (1, 3, size, size), &self.device)?;
        let logits = self.model.forward(&input)?;
        let probs = nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;
        Ok(self.labels.iter().cloned().zip(probs).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ImageId;
    use chrono::Local;
    use std::path::PathBuf;

    struct FixedScores(Vec<(&'static str, f32)>);

    impl ClassScorer for FixedScores {
        fn class_scores(&mut self, _path: &Path) -> Result<HashMap<String, f32>> {
            Ok(self.0.iter().map(|(k, v)| (k.to_string(), *v)).collect())
        }
    }

    fn nsfw_classes() -> [String; 3] {
        ["hentai".into(), "porn".into(), "sexy".into()]
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

    fn classifier_with(scores: Vec<(&'static str, f32)>) -> AlternateModelClassifier {
        AlternateModelClassifier::with_loader(nsfw_classes(), move || {
            Ok(Box::new(FixedScores(scores.clone())) as Box<dyn ClassScorer>)
        })
    }

    #[test]
    fn sums_the_three_nsfw_classes() {
        let classifier = classifier_with(vec![
            ("drawings", 0.1),
            ("hentai", 0.1),
            ("neutral", 0.3),
            ("porn", 0.2),
            ("sexy", 0.3),
        ]);
        let record = classifier.classify(&image_named("a.jpg"));
        assert_eq!(record.classification_method, ClassificationMethod::AlternateModel);
        assert!((record.nsfw_score - 0.6).abs() < 1e-6);
        assert!(record.is_nsfw);
    }

    #[test]
    fn sum_is_capped_at_one() {
        let classifier = classifier_with(vec![("hentai", 0.6), ("porn", 0.6), ("sexy", 0.6)]);
        let record = classifier.classify(&image_named("a.jpg"));
        assert_eq!(record.nsfw_score, 1.0);
    }

    #[test]
    fn missing_classes_count_as_zero() {
        let classifier = classifier_with(vec![("neutral", 0.9), ("porn", 0.05)]);
        let record = classifier.classify(&image_named("a.jpg"));
        assert!((record.nsfw_score - 0.05).abs() < 1e-6);
        assert!(!record.is_nsfw);
    }

    #[test]
    fn load_failure_yields_error_record_without_filename_fallback() {
        let classifier =
            AlternateModelClassifier::with_loader(nsfw_classes(), || anyhow::bail!("no weights"));
        let record = classifier.classify(&image_named("nsfw_xxx.jpg"));
        assert_eq!(record.classification_method, ClassificationMethod::Error);
        assert_eq!(record.nsfw_score, 0.0);
        assert!(!record.is_nsfw);
        assert!(!classifier.is_loaded());
    }

    #[test]
    fn default_backend_without_weights_reports_error() {
        let config = crate::config::ClassifierConfig::with_models_dir("/definitely/missing");
        let classifier = AlternateModelClassifier::new(config.alternate);
        let record = classifier.classify(&image_named("a.jpg"));
        assert_eq!(record.classification_method, ClassificationMethod::Error);
    }
}
