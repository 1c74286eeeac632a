use std::cmp::Ordering;

use crate::detect::{Detection, SourceBatch};
use crate::error::FusionError;

use super::FusionConfig;

/// Validated, thresholded detections of one frame in seed order.
#[derive(Clone, Debug, Default)]
pub struct PreparedPool {
    pub detections: Vec<Detection>,
    pub rejected: Vec<FusionError>,
    pub skipped: usize,
    /// Reliability weight per source id.
    pub weights: Vec<f32>,
    /// Whether each source kept at least one detection.
    pub active: Vec<bool>,
}

impl PreparedPool {
    /// Total weight of the sources that kept at least one detection.
    pub fn active_weight(&self) -> f32 {
        self.weights
            .iter()
            .zip(&self.active)
            .filter(|(_, active)| **active)
            .map(|(w, _)| *w)
            .sum()
    }
}

/// A transient group of detections judged to be the same object.
/// `members[0]` is the seed.
#[derive(Clone, Debug)]
pub struct Cluster {
    pub members: Vec<Detection>,
}

impl Cluster {
    pub fn seed(&self) -> &Detection {
        &self.members[0]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn validate(det: &Detection) -> Result<(), FusionError> {
    if !det.bbox.is_well_formed() {
        return Err(FusionError::InvalidGeometry {
            source_id: det.source,
            xmin: det.bbox.xmin,
            ymin: det.bbox.ymin,
            xmax: det.bbox.xmax,
            ymax: det.bbox.ymax,
        });
    }
    if !det.score.is_finite() || !(0.0..=1.0).contains(&det.score) {
        return Err(FusionError::InvalidScore {
            source_id: det.source,
            score: det.score,
        });
    }
    Ok(())
}

/// Seed order: score descending, then source ascending, then coordinates.
/// A total order, so the pool order never depends on input order.
fn seed_order(a: &Detection, b: &Detection) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.source.cmp(&b.source))
        .then_with(|| {
            a.bbox
                .coords()
                .iter()
                .zip(b.bbox.coords().iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then(a.label.cmp(&b.label))
}

/// Pool every source's detections, reject malformed ones, drop those below
/// `skip_box_thr`, and sort the rest into seed order.
///
/// Each detection's `source` is rewritten to its batch index.
pub fn prepare(batches: &[SourceBatch], cfg: &FusionConfig) -> PreparedPool {
    let mut pool = PreparedPool {
        weights: batches.iter().map(|b| b.weight).collect(),
        active: vec![false; batches.len()],
        ..PreparedPool::default()
    };

    for (source, batch) in batches.iter().enumerate() {
        for det in &batch.detections {
            let det = Detection { source, ..*det };
            if let Err(e) = validate(&det) {
                pool.rejected.push(e);
                continue;
            }
            if det.score < cfg.skip_box_thr {
                pool.skipped += 1;
                continue;
            }
            pool.active[source] = true;
            pool.detections.push(det);
        }
    }

    pool.detections.sort_by(seed_order);
    pool
}

/// Greedy IoU clustering over a pool already in seed order.
///
/// Members other than the seed are ordered by IoU with the seed (highest
/// first), then score, then source id.
pub fn cluster(pool: &[Detection], iou_thr: f32, same_label_only: bool) -> Vec<Cluster> {
    let mut remaining: Vec<Detection> = pool.to_vec();
    let mut clusters = Vec::new();

    while !remaining.is_empty() {
        let seed = remaining.remove(0);
        let mut joined: Vec<(f32, Detection)> = Vec::new();
        let mut rest = Vec::with_capacity(remaining.len());

        for det in remaining.drain(..) {
            let iou = seed.bbox.iou(&det.bbox);
            let label_ok = !same_label_only || det.label == seed.label;
            if label_ok && iou > iou_thr {
                joined.push((iou, det));
            } else {
                rest.push(det);
            }
        }
        remaining = rest;

        joined.sort_by(|(iou_a, a), (iou_b, b)| {
            iou_b
                .total_cmp(iou_a)
                .then(b.score.total_cmp(&a.score))
                .then(a.source.cmp(&b.source))
        });

        let mut members = Vec::with_capacity(joined.len() + 1);
        members.push(seed);
        members.extend(joined.into_iter().map(|(_, det)| det));
        clusters.push(Cluster { members });
    }

    clusters
}
