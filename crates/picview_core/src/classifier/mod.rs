//! NSFW classifier strategies.
//!
//! Three interchangeable strategies answer "is this image NSFW":
//!
//! - [`RegionDetectorClassifier`] runs a region detector and takes the most
//!   confident region as the score, falling back to filename keywords when
//!   the model cannot be loaded or run.
//! - [`HeuristicClassifier`] counts skin-tone pixels on a 100x100 raster and
//!   needs no model at all.
//! - [`AlternateModelClassifier`] sums three class probabilities of a
//!   moderation classifier and reports an `error` record on failure.
//!
//! Strategies never return errors: every failure becomes data on the
//! returned [`ImageClassification`]. Models are loaded on first use and a
//! failed load is retried on the next call.

mod alternate;
mod heuristic;
pub mod preprocess;
mod region;
mod slot;

pub use alternate::{AlternateModelClassifier, ClassScorer, VitModerationModel};
pub use heuristic::{HeuristicClassifier, heuristic_score, is_skin_tone};
pub use region::{Detection, RegionDetect, RegionDetectorClassifier, TiledEfficientVit};

use std::fmt;

use crate::config::ClassifierConfig;
use crate::entities::{Image, ImageClassification};

/// Keywords that push the heuristic score up to at least 0.7.
pub const HEURISTIC_KEYWORDS: [&str; 4] = ["nsfw", "adult", "xxx", "18"];

/// Keywords the region detector falls back to when its model fails.
pub const FALLBACK_KEYWORDS: [&str; 5] = ["nsfw", "adult", "xxx", "18+", "nude"];

/// Case-insensitive check for any of `keywords` inside `filename`.
pub fn filename_has_keyword(filename: &str, keywords: &[&str]) -> bool {
    let lower = filename.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}

/// The closed set of strategies, selected by a string tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClassifierKind {
    #[default]
    RegionDetector,
    Heuristic,
    AlternateModel,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 3] = [
        ClassifierKind::RegionDetector,
        ClassifierKind::Heuristic,
        ClassifierKind::AlternateModel,
    ];

    /// Maps a tag to a strategy. Unknown tags (and `default`) resolve to the
    /// region detector.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "simple" | "heuristic" => Self::Heuristic,
            "alternate" | "tensorflow" | "vit" => Self::AlternateModel,
            _ => Self::RegionDetector,
        }
    }

    /// Canonical tag of this strategy.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RegionDetector => "nudenet",
            Self::Heuristic => "simple",
            Self::AlternateModel => "alternate",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One strategy behind the shared `classify` capability.
pub enum Classifier {
    RegionDetector(RegionDetectorClassifier),
    Heuristic(HeuristicClassifier),
    AlternateModel(AlternateModelClassifier),
}

impl Classifier {
    /// Builds the strategy for `kind`. No model is loaded yet.
    pub fn new(kind: ClassifierKind, config: &ClassifierConfig) -> Self {
        match kind {
            ClassifierKind::RegionDetector => {
                Self::RegionDetector(RegionDetectorClassifier::new(config.region.clone()))
            }
            ClassifierKind::Heuristic => Self::Heuristic(HeuristicClassifier),
            ClassifierKind::AlternateModel => {
                Self::AlternateModel(AlternateModelClassifier::new(config.alternate.clone()))
            }
        }
    }

    pub fn from_tag(tag: &str, config: &ClassifierConfig) -> Self {
        Self::new(ClassifierKind::from_tag(tag), config)
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Self::RegionDetector(_) => ClassifierKind::RegionDetector,
            Self::Heuristic(_) => ClassifierKind::Heuristic,
            Self::AlternateModel(_) => ClassifierKind::AlternateModel,
        }
    }

    /// Classifies `image`. Never fails; see the module docs.
    pub fn classify(&self, image: &Image) -> ImageClassification {
        match self {
            Self::RegionDetector(classifier) => classifier.classify(image),
            Self::Heuristic(classifier) => classifier.classify(image),
            Self::AlternateModel(classifier) => classifier.classify(image),
        }
    }
}

impl From<RegionDetectorClassifier> for Classifier {
    fn from(value: RegionDetectorClassifier) -> Self {
        Self::RegionDetector(value)
    }
}

impl From<HeuristicClassifier> for Classifier {
    fn from(value: HeuristicClassifier) -> Self {
        Self::Heuristic(value)
    }
}

impl From<AlternateModelClassifier> for Classifier {
    fn from(value: AlternateModelClassifier) -> Self {
        Self::AlternateModel(value)
    }
}

/// One instance of every strategy, so each keeps its loaded model across
/// calls.
pub struct ClassifierSet {
    region: Classifier,
    heuristic: Classifier,
    alternate: Classifier,
}

impl ClassifierSet {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            region: Classifier::new(ClassifierKind::RegionDetector, config),
            heuristic: Classifier::new(ClassifierKind::Heuristic, config),
            alternate: Classifier::new(ClassifierKind::AlternateModel, config),
        }
    }

    /// Assembles a set from already built strategies.
    pub fn from_parts(
        region: RegionDetectorClassifier,
        heuristic: HeuristicClassifier,
        alternate: AlternateModelClassifier,
    ) -> Self {
        Self {
            region: region.into(),
            heuristic: heuristic.into(),
            alternate: alternate.into(),
        }
    }

    pub fn get(&self, kind: ClassifierKind) -> &Classifier {
        match kind {
            ClassifierKind::RegionDetector => &self.region,
            ClassifierKind::Heuristic => &self.heuristic,
            ClassifierKind::AlternateModel => &self.alternate,
        }
    }

    /// The strategy for `tag`, see [`ClassifierKind::from_tag`].
    pub fn select(&self, tag: &str) -> &Classifier {
        self.get(ClassifierKind::from_tag(tag))
    }
}
