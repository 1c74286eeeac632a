//! Box normalization between pixel space and the unit square.
//!
//! Coordinates are divided by the frame width/height and nothing else:
//! boxes that a detector places partly outside the frame come out with
//! coordinates below 0 or above 1. Fusion and the stream accept that.

use crate::detect::{BoundingBox, Detection, RawDetection, SourceId};
use crate::error::NormalizeError;

fn check_dims(width: u32, height: u32) -> Result<(f32, f32), NormalizeError> {
    if width == 0 || height == 0 {
        return Err(NormalizeError::ZeroDimension { width, height });
    }
    Ok((width as f32, height as f32))
}

/// Convert one pixel-space detection into a normalized `Detection`.
pub fn normalize(
    raw: &RawDetection,
    source: SourceId,
    width: u32,
    height: u32,
) -> Result<Detection, NormalizeError> {
    let (w, h) = check_dims(width, height)?;
    Ok(Detection {
        bbox: BoundingBox::new(
            raw.bbox.xmin / w,
            raw.bbox.ymin / h,
            raw.bbox.xmax / w,
            raw.bbox.ymax / h,
        ),
        score: raw.score,
        label: raw.label,
        source,
    })
}

/// Normalize a whole detector output for a frame.
pub fn normalize_all(
    raw: &[RawDetection],
    source: SourceId,
    width: u32,
    height: u32,
) -> Result<Vec<Detection>, NormalizeError> {
    raw.iter()
        .map(|det| normalize(det, source, width, height))
        .collect()
}

/// Map a normalized box back onto a `width x height` frame, truncating to
/// whole pixels the way the overlay draws them.
pub fn to_pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> (i32, i32, i32, i32) {
    let w = width as f32;
    let h = height as f32;
    (
        (bbox.xmin * w) as i32,
        (bbox.ymin * h) as i32,
        (bbox.xmax * w) as i32,
        (bbox.ymax * h) as i32,
    )
}
