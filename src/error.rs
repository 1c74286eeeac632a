//! Error taxonomy for the frame pipeline.
//!
//! Only `AcquisitionError` ends the frame loop. Everything else is recovered
//! where it happens: the detector failure skips its frame, a malformed
//! detection is excluded from clustering, and an unresolved label is treated
//! as not pickable. Send failures are not errors at all, see
//! [`crate::transport::SendOutcome`].

use crate::detect::SourceId;

/// The frame source could not produce a frame.
#[derive(Debug, thiserror::Error)]
#[error("frame acquisition failed: {0}")]
pub struct AcquisitionError(#[from] pub anyhow::Error);

/// One detector failed on one frame.
#[derive(Debug, thiserror::Error)]
#[error("detector '{detector}' failed: {cause}")]
pub struct DetectorError {
    pub detector: String,
    #[source]
    pub cause: anyhow::Error,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("frame dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
}

/// A detection rejected before clustering. Frame-local; other detections
/// in the same frame are unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FusionError {
    #[error("invalid geometry from source {source_id}: [{xmin}, {ymin}, {xmax}, {ymax}]")]
    InvalidGeometry {
        source_id: SourceId,
        xmin: f32,
        ymin: f32,
        xmax: f32,
        ymax: f32,
    },
    #[error("invalid score {score} from source {source_id}")]
    InvalidScore { source_id: SourceId, score: f32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("label {label} has no name in the table of source '{source_name}'")]
    UnknownLabel { source_name: String, label: u32 },
    #[error("fused box has no contributing source")]
    NoContributions,
}
