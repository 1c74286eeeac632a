//! Frame sources.
//!
//! - `stub://` synthetic frames (always available)
//! - A local directory of still images (feature: ingest-image)
//!
//! Every source hands frames over by value and keeps nothing once a frame
//! has been returned.

#[cfg(feature = "ingest-image")]
mod images;
mod synthetic;

#[cfg(feature = "ingest-image")]
pub use images::ImageDirSource;
pub use synthetic::SyntheticSource;

use anyhow::Result;

use crate::frame::FrameSource;

pub const DEFAULT_SOURCE_URL: &str = "stub://camera";
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Configuration shared by every frame source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://<name>` or a path to an image directory.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// End the stream after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            max_frames: None,
        }
    }
}

/// Build the source that `config.url` names.
pub fn open_source(config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    #[cfg(feature = "ingest-image")]
    {
        let path = config.url.strip_prefix("dir://").unwrap_or(&config.url);
        let path = std::path::PathBuf::from(path);
        Ok(Box::new(ImageDirSource::new(path, config)?))
    }
    #[cfg(not(feature = "ingest-image"))]
    {
        anyhow::bail!(
            "source '{}' requires the ingest-image feature (only stub:// is built in)",
            config.url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_urls_open_synthetic_source() -> Result<()> {
        let mut source = open_source(SourceConfig {
            max_frames: Some(1),
            ..SourceConfig::default()
        })?;
        source.connect()?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[cfg(not(feature = "ingest-image"))]
    #[test]
    fn other_urls_need_image_feature() {
        let result = open_source(SourceConfig {
            url: "/var/lib/frames".to_string(),
            ..SourceConfig::default()
        });
        assert!(result.is_err());
    }
}
