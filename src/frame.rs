//! Frames and the frame-source seam.
//!
//! A `Frame` owns its pixel buffer for exactly one pass through the
//! pipeline. Sources hand frames over by value; nothing downstream keeps
//! them once the frame has been rendered.

use anyhow::Result;

/// Packed RGB24 frame.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Sequence number assigned by the source, starting at 1.
    pub index: u64,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            index,
        }
    }

    /// Read-only pixel access for detectors.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Frame of the given size with every byte zero.
    pub fn blank(width: u32, height: u32, index: u64) -> Self {
        let len = (width as usize) * (height as usize) * 3;
        Self::new(vec![0u8; len], width, height, index)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Producer of frames for the pipeline.
///
/// `next_frame` returns `Ok(None)` at end of stream. An `Err` is an
/// acquisition failure and ends the loop.
pub trait FrameSource {
    /// Open the underlying device or stream. Failure is fatal at startup.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame, blocking at most as long as the source's own
    /// timeout allows.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}
