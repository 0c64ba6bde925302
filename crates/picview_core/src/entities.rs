//! Domain entities handed out by the repositories.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::VIDEO_FILE_TYPE;
use crate::fs::MediaMetadata;

/// Score above which an image counts as NSFW.
pub const NSFW_THRESHOLD: f32 = 0.5;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identity.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(
    /// Identity of an [`Image`].
    ImageId
);
entity_id!(
    /// Identity of a [`Folder`].
    FolderId
);
entity_id!(
    /// Identity of an [`ImageClassification`].
    ClassificationId
);

/// A media file (still image or video) materialized from disk.
///
/// Values are never updated in place by the repositories; a changed file
/// needs a new `Image` saved under the same or a new identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub path: PathBuf,
    pub filename: String,
    /// Lowercase extension without the dot, e.g. `jpg` or `mp4`.
    pub file_type: String,
    /// Size in bytes.
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Local>,
    pub modified_at: DateTime<Local>,
}

impl Image {
    /// Builds an image entity for `path` from probed metadata.
    pub fn from_metadata(id: ImageId, path: &Path, metadata: &MediaMetadata) -> Self {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = file_type_of(path);
        Self {
            id,
            path: path.to_path_buf(),
            filename,
            file_type,
            size: metadata.size,
            width: metadata.width,
            height: metadata.height,
            created_at: metadata.created,
            modified_at: metadata.modified,
        }
    }

    pub fn is_video(&self) -> bool {
        self.file_type.eq_ignore_ascii_case(VIDEO_FILE_TYPE)
    }

    /// Width divided by height, or 0 when the height is unknown.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Lowercase extension of `path` without the leading dot.
pub fn file_type_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// A directory in the browsed tree. Roots have no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub path: PathBuf,
    pub name: String,
    pub parent_id: Option<FolderId>,
}

/// Which strategy (or recovery path) produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationMethod {
    RegionDetector,
    Heuristic,
    AlternateModel,
    /// Filename keywords only, used when the region detector failed.
    Fallback,
    /// The strategy could not read the image or run its model.
    Error,
}

impl ClassificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegionDetector => "region-detector",
            Self::Heuristic => "heuristic",
            Self::AlternateModel => "alternate-model",
            Self::Fallback => "fallback",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The NSFW verdict computed for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageClassification {
    pub id: ClassificationId,
    pub image_id: ImageId,
    pub is_nsfw: bool,
    /// Always within `[0, 1]`.
    pub nsfw_score: f32,
    pub classification_method: ClassificationMethod,
    pub classified_at: DateTime<Local>,
}

impl ImageClassification {
    /// Creates a record from a raw score.
    ///
    /// The score is clamped into `[0, 1]` (NaN becomes 0) and `is_nsfw` is
    /// derived from it, so every record satisfies
    /// `is_nsfw == (nsfw_score > NSFW_THRESHOLD)`.
    pub fn from_score(image_id: ImageId, score: f32, method: ClassificationMethod) -> Self {
        let nsfw_score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self {
            id: ClassificationId::new(),
            image_id,
            is_nsfw: nsfw_score > NSFW_THRESHOLD,
            nsfw_score,
            classification_method: method,
            classified_at: Local::now(),
        }
    }

    /// Zero-score, non-NSFW record tagged [`ClassificationMethod::Error`].
    pub fn error(image_id: ImageId) -> Self {
        Self::from_score(image_id, 0.0, ClassificationMethod::Error)
    }
}
