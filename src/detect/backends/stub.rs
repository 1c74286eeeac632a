use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::labels::LabelTable;
use crate::detect::result::{BoundingBox, RawDetection};
use crate::detect::source::{DetectionSource, SourceRole};
use crate::frame::Frame;

/// An object the stub reports, in normalized coordinates.
#[derive(Clone, Debug)]
pub struct StubObject {
    pub bbox: BoundingBox,
    pub label: u32,
    pub score: f32,
}

impl StubObject {
    pub fn new(bbox: BoundingBox, label: u32, score: f32) -> Self {
        Self { bbox, label, score }
    }
}

/// Stub detector for testing and for running the daemon without models.
///
/// Reports a fixed scene of objects on every frame, with per-frame jitter
/// drawn from a generator seeded by the frame index, so the same frame
/// always yields the same detections.
pub struct StubSource {
    name: String,
    role: SourceRole,
    labels: LabelTable,
    objects: Vec<StubObject>,
    seed: u64,
    jitter: f32,
}

impl StubSource {
    pub fn new(
        name: impl Into<String>,
        role: SourceRole,
        labels: LabelTable,
        objects: Vec<StubObject>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            labels,
            objects,
            seed: 0,
            jitter: 0.0,
        }
    }

    /// COCO-vocabulary stub seeing a bottle, a cell phone and a person.
    pub fn general() -> Self {
        Self::new(
            "stub-general",
            SourceRole::General,
            LabelTable::coco(),
            vec![
                StubObject::new(BoundingBox::new(0.10, 0.10, 0.30, 0.30), 39, 0.80),
                StubObject::new(BoundingBox::new(0.55, 0.40, 0.70, 0.62), 67, 0.55),
                StubObject::new(BoundingBox::new(0.75, 0.05, 0.95, 0.90), 0, 0.90),
            ],
        )
        .with_seed(1)
        .with_jitter(0.01)
    }

    /// Debris-vocabulary stub seeing the same bottle and phone plus a glove.
    pub fn trusted() -> Self {
        Self::new(
            "stub-trusted",
            SourceRole::Trusted,
            LabelTable::debris(),
            vec![
                StubObject::new(BoundingBox::new(0.12, 0.12, 0.31, 0.29), 10, 0.90),
                StubObject::new(BoundingBox::new(0.56, 0.41, 0.69, 0.60), 2, 0.70),
                StubObject::new(BoundingBox::new(0.35, 0.70, 0.45, 0.80), 5, 0.60),
            ],
        )
        .with_seed(2)
        .with_jitter(0.01)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Maximum absolute per-coordinate jitter, normalized units.
    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter.max(0.0);
        self
    }
}

impl DetectionSource for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn labels(&self) -> &LabelTable {
        &self.labels
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ frame.index.wrapping_mul(0x9E37_79B9));
        let w = frame.width as f32;
        let h = frame.height as f32;

        let detections = self
            .objects
            .iter()
            .map(|obj| {
                let mut coords = obj.bbox.coords();
                if self.jitter > 0.0 {
                    for c in coords.iter_mut() {
                        *c += rng.gen_range(-self.jitter..self.jitter);
                    }
                }
                // Jitter must not invert a box.
                let (xmin, xmax) = (coords[0].min(coords[2]), coords[0].max(coords[2]));
                let (ymin, ymax) = (coords[1].min(coords[3]), coords[1].max(coords[3]));
                RawDetection::new(xmin * w, ymin * h, xmax * w, ymax * h, obj.score, obj.label)
            })
            .collect();
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_reports_pixel_space_boxes() -> Result<()> {
        let mut source = StubSource::general().with_jitter(0.0);
        let frame = Frame::blank(640, 480, 1);
        let detections = source.detect(&frame)?;
        assert_eq!(detections.len(), 3);
        let bottle = &detections[0];
        assert!((bottle.bbox.xmin - 64.0).abs() < 1e-3);
        assert!((bottle.bbox.ymax - 144.0).abs() < 1e-3);
        assert_eq!(source.labels().name(bottle.label), Some("bottle"));
        Ok(())
    }

    #[test]
    fn jitter_is_deterministic_per_frame() -> Result<()> {
        let mut a = StubSource::trusted();
        let mut b = StubSource::trusted();
        let frame = Frame::blank(320, 240, 7);
        assert_eq!(a.detect(&frame)?, b.detect(&frame)?);

        let other = Frame::blank(320, 240, 8);
        assert_ne!(a.detect(&frame)?, a.detect(&other)?);
        Ok(())
    }

    #[test]
    fn jittered_boxes_stay_well_formed() -> Result<()> {
        let mut source = StubSource::general().with_jitter(0.2);
        for index in 1..50 {
            let frame = Frame::blank(100, 100, index);
            for det in source.detect(&frame)? {
                assert!(det.bbox.is_well_formed());
            }
        }
        Ok(())
    }
}
