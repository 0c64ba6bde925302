//! Classifier configuration and persisted user settings.

use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::ClassifierKind;

/// Environment variable that overrides the models directory.
pub const MODELS_DIR_ENV: &str = "PICVIEW_MODELS_DIR";

/// EfficientViT variants the region detector can load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EfficientVitVariant {
    #[default]
    M0,
    M1,
    M2,
    M3,
    M4,
    M5,
}

impl EfficientVitVariant {
    /// Returns the canonical transformer configuration for this variant.
    pub fn config(&self) -> candle_transformers::models::efficientvit::Config {
        use candle_transformers::models::efficientvit::Config;
        match self {
            Self::M0 => Config::m0(),
            Self::M1 => Config::m1(),
            Self::M2 => Config::m2(),
            Self::M3 => Config::m3(),
            Self::M4 => Config::m4(),
            Self::M5 => Config::m5(),
        }
    }
}

/// Settings for the tiled EfficientViT region detector.
#[derive(Debug, Clone)]
pub struct RegionDetectorConfig {
    /// Path to the `.safetensors` weights.
    pub model_path: PathBuf,
    /// CSV file listing one label per line, first column used.
    pub labels_path: PathBuf,
    pub variant: EfficientVitVariant,
    /// Width/height of the resized square input.
    pub input_size: u32,
    /// The frame is split into `grid x grid` tiles in addition to the full frame.
    pub grid: u32,
    /// Tiles below this probability are not reported as regions.
    pub min_confidence: f32,
    /// Labels (lowercase) that mark a region as exposed content.
    pub nsfw_labels: Vec<String>,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// Settings for the ViT moderation classifier.
#[derive(Debug, Clone)]
pub struct AlternateModelConfig {
    /// Directory holding `config.json` and `model.safetensors`.
    pub model_dir: PathBuf,
    /// Output classes in model order.
    pub labels: Vec<String>,
    /// The classes whose probabilities are summed into the NSFW score.
    pub nsfw_classes: [String; 3],
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// Configuration used to build the classifier strategies.
///
/// Values default to models under `models/` but can be pointed anywhere.
/// Nothing is loaded when the config is built; each strategy loads its model
/// on first use.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub region: RegionDetectorConfig,
    pub alternate: AlternateModelConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::with_models_dir("models")
    }
}

impl ClassifierConfig {
    /// Default file names resolved against `models_dir`.
    pub fn with_models_dir(models_dir: impl AsRef<Path>) -> Self {
        let dir = models_dir.as_ref();
        Self {
            region: RegionDetectorConfig {
                model_path: dir.join("nsfw-regions-efficientvit-m0.safetensors"),
                labels_path: dir.join("nsfw-regions-labels.csv"),
                variant: EfficientVitVariant::M0,
                input_size: 224,
                grid: 3,
                min_confidence: 0.2,
                nsfw_labels: ["exposed_breast", "exposed_genitalia", "exposed_buttocks", "exposed_anus"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                mean: [0.485, 0.456, 0.406],
                std: [0.229, 0.224, 0.225],
            },
            alternate: AlternateModelConfig {
                model_dir: dir.join("nsfw-vit"),
                labels: ["drawings", "hentai", "neutral", "porn", "sexy"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                nsfw_classes: ["hentai".into(), "porn".into(), "sexy".into()],
                input_size: 224,
                mean: [0.5, 0.5, 0.5],
                std: [0.5, 0.5, 0.5],
            },
        }
    }
}

/// User settings persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Tag passed to the classify use case when the caller gives none.
    pub default_classifier: String,
    pub models_dir: PathBuf,
    pub page_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_classifier: ClassifierKind::default().tag().to_string(),
            models_dir: PathBuf::from("models"),
            page_size: 100,
        }
    }
}

impl AppSettings {
    /// Classifier configuration rooted at the configured models directory.
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig::with_models_dir(&self.models_dir)
    }

    fn apply_env_overrides(mut self) -> Self {
        if let Some(dir) = std::env::var_os(MODELS_DIR_ENV) {
            self.models_dir = PathBuf::from(dir);
        }
        self
    }
}

fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "PicView", "PicView").map(|dirs| dirs.data_dir().join("settings.json"))
}

/// Loads settings from the platform data dir, falling back to defaults.
pub fn load_settings() -> AppSettings {
    let settings = match settings_path() {
        Some(path) => load_settings_from(&path),
        None => AppSettings::default(),
    };
    settings.apply_env_overrides()
}

/// Loads settings from `path`; missing or corrupt files yield defaults.
pub fn load_settings_from(path: &Path) -> AppSettings {
    let Ok(contents) = fs::read_to_string(path) else {
        return AppSettings::default();
    };
    match serde_json::from_str::<AppSettings>(&contents) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!("settings file {} unreadable: {err}", path.display());
            AppSettings::default()
        }
    }
}

/// Writes settings to the platform data dir.
pub fn save_settings(settings: &AppSettings) -> anyhow::Result<()> {
    let Some(path) = settings_path() else {
        return Ok(());
    };
    save_settings_to(settings, &path)
}

pub fn save_settings_to(settings: &AppSettings, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let payload = serde_json::to_string_pretty(settings)?;
    fs::write(path, payload)?;
    Ok(())
}
