use crate::detect::{BoundingBox, SourceBatch};

use super::cluster::{cluster, prepare, Cluster, PreparedPool};
use super::{FusedBox, FusionConfig, FusionOutput, SourceContribution};

/// Weighted Boxes Fusion over any number of sources.
#[derive(Clone, Debug, Default)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Fuse one frame's detections, one batch per source (batch index is
    /// the source id).
    ///
    /// For a cluster with members `i`, source weights `w` and scores `s`:
    /// - box = Σ(wᵢ·sᵢ·coordᵢ) / Σ(wᵢ·sᵢ)
    /// - score = Σ(wᵢ·sᵢ) / Σwᵢ, multiplied (when penalizing) by the
    ///   weight of the distinct sources in the cluster over the weight of
    ///   all sources that produced anything this frame
    /// - label = label of the seed, which is the highest-scoring member
    ///
    /// Output is ordered by fused score, highest first; equal scores keep
    /// seed order.
    pub fn fuse(&self, batches: &[SourceBatch]) -> FusionOutput {
        let pool = prepare(batches, &self.config);
        let clusters = cluster(
            &pool.detections,
            self.config.iou_thr,
            self.config.same_label_only,
        );

        let mut boxes: Vec<FusedBox> = clusters
            .iter()
            .map(|c| self.fuse_cluster(c, &pool))
            .collect();
        boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

        log::trace!(
            "fused {} detections into {} boxes ({} skipped, {} rejected)",
            pool.detections.len(),
            boxes.len(),
            pool.skipped,
            pool.rejected.len()
        );

        FusionOutput {
            boxes,
            rejected: pool.rejected,
            skipped: pool.skipped,
        }
    }

    fn fuse_cluster(&self, cluster: &Cluster, pool: &PreparedPool) -> FusedBox {
        let weight_of = |source: usize| pool.weights.get(source).copied().unwrap_or(1.0);

        let mut coord_sum = [0.0f32; 4];
        let mut conf_sum = 0.0f32;
        let mut weight_sum = 0.0f32;
        for det in &cluster.members {
            let w = weight_of(det.source);
            let ws = w * det.score;
            for (acc, c) in coord_sum.iter_mut().zip(det.bbox.coords()) {
                *acc += ws * c;
            }
            conf_sum += ws;
            weight_sum += w;
        }

        let bbox = if conf_sum > 0.0 {
            BoundingBox::new(
                coord_sum[0] / conf_sum,
                coord_sum[1] / conf_sum,
                coord_sum[2] / conf_sum,
                coord_sum[3] / conf_sum,
            )
        } else {
            mean_box(cluster)
        };

        let contributions = contributions(cluster);

        let mut score = if weight_sum > 0.0 {
            conf_sum / weight_sum
        } else {
            0.0
        };
        if self.config.penalize_missing_sources {
            let active = pool.active_weight();
            let contributing: f32 = contributions.iter().map(|c| weight_of(c.source)).sum();
            if active > 0.0 {
                score *= (contributing / active).min(1.0);
            }
        }

        let seed = cluster.seed();
        FusedBox {
            bbox,
            score: score.clamp(0.0, 1.0),
            label: seed.label,
            label_source: seed.source,
            contributions,
            members: cluster.len(),
        }
    }
}

/// Unweighted mean, used when every member scored exactly zero.
fn mean_box(cluster: &Cluster) -> BoundingBox {
    let n = cluster.len() as f32;
    let mut sum = [0.0f32; 4];
    for det in &cluster.members {
        for (acc, c) in sum.iter_mut().zip(det.bbox.coords()) {
            *acc += c;
        }
    }
    BoundingBox::new(sum[0] / n, sum[1] / n, sum[2] / n, sum[3] / n)
}

/// Best member per source. Members are already ordered, so the first hit
/// at the highest score wins.
fn contributions(cluster: &Cluster) -> Vec<SourceContribution> {
    let mut out: Vec<SourceContribution> = Vec::new();
    for det in &cluster.members {
        match out.iter_mut().find(|c| c.source == det.source) {
            Some(existing) if det.score > existing.score => {
                existing.label = det.label;
                existing.score = det.score;
            }
            Some(_) => {}
            None => out.push(SourceContribution {
                source: det.source,
                label: det.label,
                score: det.score,
            }),
        }
    }
    out.sort_by_key(|c| c.source);
    out
}
