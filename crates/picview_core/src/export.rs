//! CSV report of classified images.

use std::path::Path;

use crate::entities::{Image, ImageClassification};
use crate::error::BrowserError;

/// Column names of the report, in order.
pub const REPORT_HEADERS: [&str; 6] = [
    "path",
    "filename",
    "is_nsfw",
    "nsfw_score",
    "method",
    "classified_at",
];

/// Writes one row per `(image, classification)` pair to `path`.
pub fn export_csv(
    rows: &[(Image, ImageClassification)],
    path: impl AsRef<Path>,
) -> Result<(), BrowserError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(REPORT_HEADERS)?;

    for (image, record) in rows {
        let score = format!("{:.4}", record.nsfw_score);
        let classified_at = record.classified_at.to_rfc3339();
        wtr.write_record([
            image.path.to_string_lossy().as_ref(),
            image.filename.as_str(),
            if record.is_nsfw { "true" } else { "false" },
            score.as_str(),
            record.classification_method.as_str(),
            classified_at.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
