use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::CaptureError;

/// Source of frames for the detection scheduler
///
/// One call per scheduler tick. Implementations own whatever state they
/// need to produce the next frame (file cursor, capturer handle).
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<RgbaImage, CaptureError>;
}

/// Replays the images of a directory in file-name order, wrapping around
///
/// Used for offline runs against recorded screenshots.
pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ImageDirSource {
    /// Scan `dir` for `.png`/`.jpg`/`.jpeg` files
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = fs::read_dir(&dir).map_err(|e| CaptureError::LoadFailed {
            path: dir.display().to_string(),
            source: Box::new(e),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::NoFrames(dir.display().to_string()));
        }

        tracing::info!("Frame source: {} images in {}", files.len(), dir.display());
        Ok(Self {
            dir,
            files,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<RgbaImage, CaptureError> {
        let Some(path) = self.files.get(self.cursor) else {
            return Err(CaptureError::NoFrames(self.dir.display().to_string()));
        };
        self.cursor = (self.cursor + 1) % self.files.len();

        let frame = image::open(path).map_err(|e| CaptureError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        Ok(frame.to_rgba8())
    }
}

/// Always returns the same frame
#[derive(Debug, Clone)]
pub struct StaticFrameSource {
    frame: RgbaImage,
}

impl StaticFrameSource {
    pub fn new(frame: RgbaImage) -> Self {
        Self { frame }
    }
}

impl FrameSource for StaticFrameSource {
    fn next_frame(&mut self) -> Result<RgbaImage, CaptureError> {
        Ok(self.frame.clone())
    }
}
