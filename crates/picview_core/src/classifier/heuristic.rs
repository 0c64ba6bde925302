use anyhow::{Context, Result};
use std::path::Path;

use super::preprocess::resize_to_square_rgb;
use super::{HEURISTIC_KEYWORDS, filename_has_keyword};
use crate::entities::{ClassificationMethod, Image, ImageClassification};

/// Side of the square raster the skin-tone count runs on.
const RASTER_SIZE: u32 = 100;
const BASE_SCORE: f32 = 0.3;
const SKIN_WEIGHT: f32 = 0.5;
const MAX_PIXEL_SCORE: f32 = 0.8;
const KEYWORD_FLOOR: f32 = 0.7;

/// Model-free strategy based on the share of skin-toned pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn classify(&self, image: &Image) -> ImageClassification {
        match skin_ratio(&image.path) {
            Ok(ratio) => {
                let score = heuristic_score(ratio, &image.filename);
                tracing::debug!(
                    "heuristic {}: skin_ratio={ratio:.3} score={score:.3}",
                    image.filename
                );
                ImageClassification::from_score(image.id, score, ClassificationMethod::Heuristic)
            }
            Err(err) => {
                tracing::warn!("heuristic classification failed for {}: {err:#}", image.path.display());
                ImageClassification::error(image.id)
            }
        }
    }
}

/// Approximate skin band: R in [60, 255], G in [40, 200], B in [20, 180].
pub fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    r >= 60 && (40..=200).contains(&g) && (20..=180).contains(&b)
}

/// Score for a given skin ratio and filename.
///
/// `min(0.3 + ratio * 0.5, 0.8)`, raised to at least 0.7 when the filename
/// carries one of [`HEURISTIC_KEYWORDS`].
pub fn heuristic_score(skin_ratio: f32, filename: &str) -> f32 {
    let mut score = (BASE_SCORE + skin_ratio * SKIN_WEIGHT).min(MAX_PIXEL_SCORE);
    if filename_has_keyword(filename, &HEURISTIC_KEYWORDS) {
        score = score.max(KEYWORD_FLOOR);
    }
    score
}

/// Share of skin-toned pixels after downsampling to the fixed raster.
fn skin_ratio(path: &Path) -> Result<f32> {
    let img = image::open(path).with_context(|| format!("cannot decode {}", path.display()))?;
    let raster = resize_to_square_rgb(img, RASTER_SIZE)?;
    let total = (RASTER_SIZE * RASTER_SIZE) as usize;
    let matching = raster
        .chunks_exact(3)
        .filter(|px| is_skin_tone(px[0], px[1], px[2]))
        .count();
    Ok(matching as f32 / total as f32)
}
