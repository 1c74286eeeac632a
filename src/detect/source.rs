use anyhow::Result;

use crate::detect::labels::LabelTable;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Which vocabulary a source speaks and how much the tagger trusts it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceRole {
    /// Pretrained, general-purpose detector (e.g. COCO).
    General,
    /// Custom-trained detector whose classes decide pickability.
    Trusted,
}

impl SourceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRole::General => "general",
            SourceRole::Trusted => "trusted",
        }
    }
}

/// A detector the pipeline can run on a frame.
///
/// Implementations treat the frame as read-only and must not keep it past
/// the `detect` call. Boxes are returned in pixel space of the frame they
/// were computed on; normalization happens downstream.
pub trait DetectionSource: Send {
    /// Source identifier for logs.
    fn name(&self) -> &str;

    fn role(&self) -> SourceRole;

    /// Label id to class name table for this source's vocabulary.
    fn labels(&self) -> &LabelTable;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, called once before the loop starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
