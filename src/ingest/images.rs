use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;

use super::SourceConfig;
use crate::frame::{Frame, FrameSource, SourceStats};

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Plays a directory of still images as a stream, in file-name order.
///
/// Every image is decoded to RGB and resized to the configured frame size.
pub struct ImageDirSource {
    dir: PathBuf,
    config: SourceConfig,
    files: Vec<PathBuf>,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageDirSource {
    pub fn new(dir: PathBuf, config: SourceConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "image source needs non-zero dimensions (got {}x{})",
                config.width,
                config.height
            ));
        }
        Ok(Self {
            dir,
            config,
            files: Vec::new(),
            frame_count: 0,
            last_error: None,
        })
    }

    fn decode(&self, path: &PathBuf) -> Result<Vec<u8>> {
        let image = image::open(path).with_context(|| format!("decode {}", path.display()))?;
        let resized = image.resize_exact(self.config.width, self.config.height, FilterType::Nearest);
        Ok(resized.into_rgb8().into_raw())
    }
}

impl FrameSource for ImageDirSource {
    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("open image directory {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", self.dir.display()));
        }
        log::info!(
            "ImageDirSource: {} images in {}",
            files.len(),
            self.dir.display()
        );
        self.files = files;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let limit = self.config.max_frames.unwrap_or(u64::MAX);
        let position = self.frame_count as usize;
        if self.frame_count >= limit || position >= self.files.len() {
            return Ok(None);
        }
        let path = self.files[position].clone();
        let pixels = match self.decode(&path) {
            Ok(pixels) => pixels,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        self.frame_count += 1;
        Ok(Some(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )))
    }

    fn is_healthy(&self) -> bool {
        !self.files.is_empty() && self.last_error.is_none()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.dir.display().to_string(),
        }
    }
}
