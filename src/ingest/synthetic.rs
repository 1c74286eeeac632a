use anyhow::{anyhow, Result};

use super::SourceConfig;
use crate::frame::{Frame, FrameSource, SourceStats};

/// Synthetic source for `stub://` URLs.
///
/// Produces a moving gradient so consecutive frames differ. Ends the stream
/// after `max_frames` when one is set.
pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow!(
                "synthetic source needs non-zero dimensions (got {}x{})",
                self.config.width,
                self.config.height
            ));
        }
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.url,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("synthetic source {} is not connected", self.config.url));
        }
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count >= max)
        {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(Some(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )))
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_indexed_from_one_and_sized() -> Result<()> {
        let mut source = SyntheticSource::new(SourceConfig {
            width: 8,
            height: 4,
            max_frames: Some(2),
            ..SourceConfig::default()
        });
        source.connect()?;
        let first = source.next_frame()?.ok_or_else(|| anyhow!("no frame"))?;
        let second = source.next_frame()?.ok_or_else(|| anyhow!("no frame"))?;
        assert_eq!(first.index, 1);
        assert_eq!(second.index, 2);
        assert_eq!(first.pixels().len(), 8 * 4 * 3);
        assert_ne!(first.pixels(), second.pixels());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn capture_before_connect_fails() {
        let mut source = SyntheticSource::new(SourceConfig::default());
        assert!(!source.is_healthy());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn zero_dimensions_fail_to_connect() {
        let mut source = SyntheticSource::new(SourceConfig {
            width: 0,
            ..SourceConfig::default()
        });
        assert!(source.connect().is_err());
    }
}
