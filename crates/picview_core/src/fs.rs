//! Filesystem collaborators: directory listing and media metadata probing.
//!
//! The repositories only see the [`DirectoryLister`] and [`MetadataProbe`]
//! traits. [`FileSystem`] is the concrete implementation used by the app: it
//! reads image headers through `image` and asks `ffprobe` about videos.

use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::ProbeError;
use crate::{VIDEO_FILE_TYPE, is_supported_media};

/// Extra fields reported for video files.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub frame_count: u64,
    pub fps: f64,
    /// Seconds, `frame_count / fps` or 0 when the frame rate is unknown.
    pub duration: f64,
}

/// Everything the probe knows about a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    /// Container or codec name, e.g. `png` or `mp4`.
    pub format: String,
    pub size: u64,
    pub created: DateTime<Local>,
    pub modified: DateTime<Local>,
    pub video: Option<VideoMetadata>,
}

/// One entry returned by [`DirectoryLister::list_directory`].
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntryInfo {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    /// Bytes; always 0 for directories.
    pub size: u64,
    pub modified: DateTime<Local>,
}

/// Reads dimensions, size and timestamps of a media file.
pub trait MetadataProbe: Send + Sync {
    fn get_metadata(&self, path: &Path) -> Result<MediaMetadata, ProbeError>;
}

/// Lists directories one level deep.
pub trait DirectoryLister: Send + Sync {
    /// Returns subdirectories and supported media files of `path`.
    fn list_directory(&self, path: &Path) -> Result<Vec<DirEntryInfo>, ProbeError>;

    fn is_directory(&self, path: &Path) -> bool;
}

/// Local filesystem implementation of both collaborator traits.
#[derive(Debug, Clone)]
pub struct FileSystem {
    ffprobe: PathBuf,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific `ffprobe` executable for video metadata.
    pub fn with_ffprobe(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }

    fn image_metadata(&self, path: &Path, meta: &fs::Metadata) -> Result<MediaMetadata, ProbeError> {
        let format = image::ImageFormat::from_path(path)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("unknown")
            .to_string();
        let (width, height) =
            image::image_dimensions(path).map_err(|source| ProbeError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        let (created, modified) = timestamps(meta);
        Ok(MediaMetadata {
            width,
            height,
            format,
            size: meta.len(),
            created,
            modified,
            video: None,
        })
    }

    fn video_metadata(&self, path: &Path, meta: &fs::Metadata) -> Result<MediaMetadata, ProbeError> {
        let video_err = |reason: String| ProbeError::Video {
            path: path.to_path_buf(),
            reason,
        };
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error"])
            .args(["-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height,nb_frames,avg_frame_rate"])
            .args(["-of", "json"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| video_err(format!("ffprobe not available: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(video_err(stderr.trim().to_string()));
        }
        let stream = parse_ffprobe_stream(&output.stdout).map_err(video_err)?;
        let (created, modified) = timestamps(meta);
        let fps = stream.avg_frame_rate.as_deref().map(parse_frame_rate).unwrap_or(0.0);
        let frame_count = stream
            .nb_frames
            .as_deref()
            .and_then(|frames| frames.parse::<u64>().ok())
            .unwrap_or(0);
        let duration = if fps > 0.0 {
            frame_count as f64 / fps
        } else {
            0.0
        };
        Ok(MediaMetadata {
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
            format: VIDEO_FILE_TYPE.to_string(),
            size: meta.len(),
            created,
            modified,
            video: Some(VideoMetadata {
                frame_count,
                fps,
                duration,
            }),
        })
    }
}

impl MetadataProbe for FileSystem {
    fn get_metadata(&self, path: &Path) -> Result<MediaMetadata, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }
        let meta = fs::metadata(path).map_err(|source| ProbeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_video = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(VIDEO_FILE_TYPE));
        if is_video {
            self.video_metadata(path, &meta)
        } else {
            self.image_metadata(path, &meta)
        }
    }
}

impl DirectoryLister for FileSystem {
    fn list_directory(&self, path: &Path) -> Result<Vec<DirEntryInfo>, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }
        let io_err = |source: std::io::Error| ProbeError::Io {
            path: path.to_path_buf(),
            source,
        };
        if !path.is_dir() {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "not a directory",
            )));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("walkdir error in {}: {e}", path.display());
                    continue;
                }
            };
            let entry_path = entry.path();
            let is_directory = entry.file_type().is_dir();
            if !is_directory && !is_supported_media(entry_path) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("skipping {}: {e}", entry_path.display());
                    continue;
                }
            };
            let (_, modified) = timestamps(&meta);
            entries.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry_path.to_path_buf(),
                is_directory,
                size: if is_directory { 0 } else { meta.len() },
                modified,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Created (falling back to modified) and modified times of a file.
fn timestamps(meta: &fs::Metadata) -> (DateTime<Local>, DateTime<Local>) {
    let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
    let created = meta.created().unwrap_or(modified);
    (created.into(), modified.into())
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    avg_frame_rate: Option<String>,
}

fn parse_ffprobe_stream(stdout: &[u8]) -> Result<FfprobeStream, String> {
    let parsed: FfprobeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable ffprobe output: {e}"))?;
    parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())
}

/// Parses ffprobe rates such as `30000/1001` or `25`.
fn parse_frame_rate(raw: &str) -> f64 {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().unwrap_or(0.0);
            let den = den.trim().parse::<f64>().unwrap_or(0.0);
            if den > 0.0 { num / den } else { 0.0 }
        }
        None => raw.trim().parse::<f64>().unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn list_directory_returns_dirs_and_media_only() -> Result<()> {
        let dir = tempdir()?;
        File::create(dir.path().join("b.png"))?;
        File::create(dir.path().join("a.JPG"))?;
        File::create(dir.path().join("notes.txt"))?;
        fs::create_dir(dir.path().join("nested"))?;
        File::create(dir.path().join("nested").join("deep.jpg"))?;

        let entries = FileSystem::new().list_directory(dir.path())?;
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "nested"]);
        let nested = entries.iter().find(|e| e.name == "nested").unwrap();
        assert!(nested.is_directory);
        assert_eq!(nested.size, 0);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn list_directory_follows_symlinks() -> Result<()> {
        use std::os::unix::fs::symlink;

        let target = tempdir()?;
        image::RgbImage::new(6, 6).save(target.path().join("real.png"))?;
        fs::create_dir(target.path().join("album"))?;

        let dir = tempdir()?;
        symlink(target.path().join("real.png"), dir.path().join("linked.png"))?;
        symlink(target.path().join("album"), dir.path().join("linked_album"))?;
        symlink(target.path().join("gone.png"), dir.path().join("dangling.png"))?;

        let entries = FileSystem::new().list_directory(dir.path())?;
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["linked.png", "linked_album"]);
        let real_size = fs::metadata(target.path().join("real.png"))?.len();
        assert_eq!(entries[0].size, real_size);
        assert!(!entries[0].is_directory);
        assert!(entries[1].is_directory);
        Ok(())
    }

    #[test]
    fn list_directory_rejects_missing_and_plain_files() -> Result<()> {
        let dir = tempdir()?;
        let fs = FileSystem::new();
        assert!(matches!(
            fs.list_directory(&dir.path().join("missing")),
            Err(ProbeError::NotFound(_))
        ));
        let file = dir.path().join("a.png");
        File::create(&file)?;
        assert!(fs.list_directory(&file).is_err());
        Ok(())
    }

    #[test]
    fn image_metadata_reads_header() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("frame.png");
        image::RgbImage::new(12, 8).save(&path)?;

        let meta = FileSystem::new().get_metadata(&path)?;
        assert_eq!((meta.width, meta.height), (12, 8));
        assert_eq!(meta.format, "png");
        assert!(meta.size > 0);
        assert!(meta.video.is_none());
        Ok(())
    }

    #[test]
    fn corrupt_image_is_a_decode_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg")?;
        assert!(matches!(
            FileSystem::new().get_metadata(&path),
            Err(ProbeError::Decode { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_ffprobe_is_a_video_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clip.mp4");
        fs::write(&path, b"\0\0\0\x18ftypmp42")?;
        let fs = FileSystem::with_ffprobe(dir.path().join("no-such-ffprobe"));
        assert!(matches!(fs.get_metadata(&path), Err(ProbeError::Video { .. })));
        Ok(())
    }

    #[test]
    fn ffprobe_json_and_rates_parse() {
        let json = br#"{"streams":[{"width":1920,"height":1080,"nb_frames":"300","avg_frame_rate":"30000/1001"}]}"#;
        let stream = parse_ffprobe_stream(json).unwrap();
        assert_eq!(stream.width, Some(1920));
        assert_eq!(stream.nb_frames.as_deref(), Some("300"));
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert!(parse_ffprobe_stream(br#"{"streams":[]}"#).is_err());
    }
}
