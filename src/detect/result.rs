/// Index of a detection source within the pipeline's ordered source list.
pub type SourceId = usize;

/// Axis-aligned box in corner form.
///
/// Coordinates are pixels for `RawDetection` and unit-square fractions for
/// `Detection`. Nothing here clamps: boxes the detector places partly outside
/// the frame keep their out-of-range coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// Finite coordinates with `xmin <= xmax` and `ymin <= ymax`.
    pub fn is_well_formed(&self) -> bool {
        let finite = [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite());
        finite && self.xmin <= self.xmax && self.ymin <= self.ymax
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let l = self.xmin.max(other.xmin);
        let r = self.xmax.min(other.xmax);
        let t = self.ymin.max(other.ymin);
        let b = self.ymax.min(other.ymax);
        (r - l).max(0.0) * (b - t).max(0.0)
    }

    /// Intersection over union. Two degenerate boxes have an IoU of zero.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    pub(crate) fn coords(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

/// Detector output in pixel space, before normalization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub label: u32,
}

impl RawDetection {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32, score: f32, label: u32) -> Self {
        Self {
            bbox: BoundingBox::new(xmin, ymin, xmax, ymax),
            score,
            label,
        }
    }
}

/// Normalized detection tagged with the source that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub label: u32,
    pub source: SourceId,
}

/// One source's normalized detections for a single frame.
#[derive(Clone, Debug)]
pub struct SourceBatch {
    /// Reliability weight of the source (1.0 unless configured otherwise).
    pub weight: f32,
    pub detections: Vec<Detection>,
}

impl SourceBatch {
    pub fn new(weight: f32, detections: Vec<Detection>) -> Self {
        Self { weight, detections }
    }

    pub fn empty(weight: f32) -> Self {
        Self::new(weight, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox::new(0.1, 0.1, 0.3, 0.3);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 0.1, 0.1);
        let b = BoundingBox::new(0.5, 0.5, 0.6, 0.6);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 0.2, 0.1);
        let b = BoundingBox::new(0.1, 0.0, 0.3, 0.1);
        // intersection 0.01, union 0.03
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_boxes_have_zero_iou() {
        let p = BoundingBox::new(0.2, 0.2, 0.2, 0.2);
        assert_eq!(p.iou(&p), 0.0);
    }

    #[test]
    fn well_formed_rejects_inverted_and_nan() {
        assert!(BoundingBox::new(0.1, 0.1, 0.2, 0.2).is_well_formed());
        assert!(!BoundingBox::new(0.3, 0.1, 0.2, 0.2).is_well_formed());
        assert!(!BoundingBox::new(0.1, f32::NAN, 0.2, 0.2).is_well_formed());
    }
}
