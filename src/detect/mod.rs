mod labels;
mod registry;
mod result;
mod source;

pub mod backends;

pub use backends::{ReplaySource, StubObject, StubSource};
pub use labels::{LabelTable, COCO_CLASSES, DEBRIS_CLASSES};
pub use registry::SourceSet;
pub use result::{BoundingBox, Detection, RawDetection, SourceBatch, SourceId};
pub use source::{DetectionSource, SourceRole};
