use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by the metadata probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode image header of {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot probe video {}: {reason}", path.display())]
    Video { path: PathBuf, reason: String },
}

/// Errors that cross the use-case boundary.
///
/// Model and inference failures never show up here; strategies absorb them
/// and report the outcome through the classification method tag.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

impl BrowserError {
    /// True for the not-found family that the UI shows as a plain message.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ImageNotFound(_) | Self::FolderNotFound(_))
    }
}
