//! Weighted Boxes Fusion across detection sources.
//!
//! All sources' normalized detections are pooled, invalid and low-score
//! ones are dropped, and the pool is clustered greedily: the best remaining
//! detection seeds a cluster that absorbs every remaining detection whose
//! IoU with the seed exceeds `iou_thr`. Each cluster becomes one
//! [`FusedBox`]. See [`FusionEngine::fuse`] for the scoring rule.

mod cluster;
mod wbf;

pub use cluster::{cluster, prepare, Cluster, PreparedPool};
pub use wbf::FusionEngine;

use serde::Deserialize;

use crate::detect::{BoundingBox, SourceId};
use crate::error::FusionError;

pub const DEFAULT_IOU_THR: f32 = 0.5;
pub const DEFAULT_SKIP_BOX_THR: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Detections join a seed's cluster when their IoU with it exceeds this.
    pub iou_thr: f32,
    /// Detections scoring below this never enter clustering.
    pub skip_box_thr: f32,
    /// Scale a cluster's score by the share of active source weight that
    /// contributed to it.
    pub penalize_missing_sources: bool,
    /// Only cluster detections carrying the seed's label id.
    pub same_label_only: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            iou_thr: DEFAULT_IOU_THR,
            skip_box_thr: DEFAULT_SKIP_BOX_THR,
            penalize_missing_sources: true,
            same_label_only: false,
        }
    }
}

/// The best detection one source contributed to a cluster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceContribution {
    pub source: SourceId,
    /// Label id in that source's own vocabulary.
    pub label: u32,
    pub score: f32,
}

/// One fused detection. Immutable once emitted; lives for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedBox {
    pub bbox: BoundingBox,
    pub score: f32,
    /// Label of the highest-scoring member.
    pub label: u32,
    /// Source of the highest-scoring member, i.e. the vocabulary of `label`.
    pub label_source: SourceId,
    /// One entry per contributing source, ordered by source id.
    pub contributions: Vec<SourceContribution>,
    /// Number of detections merged into this box.
    pub members: usize,
}

impl FusedBox {
    pub fn center(&self) -> (f32, f32) {
        self.bbox.center()
    }

    pub fn contributing_sources(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.contributions.iter().map(|c| c.source)
    }

    pub fn contribution_from(&self, source: SourceId) -> Option<&SourceContribution> {
        self.contributions.iter().find(|c| c.source == source)
    }
}

/// Result of fusing one frame.
#[derive(Clone, Debug, Default)]
pub struct FusionOutput {
    /// Fused boxes, highest score first.
    pub boxes: Vec<FusedBox>,
    /// Detections excluded for malformed geometry or score.
    pub rejected: Vec<FusionError>,
    /// Detections excluded by `skip_box_thr`.
    pub skipped: usize,
}
