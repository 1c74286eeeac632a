//! Fusion Relay
//!
//! Two-detector ensemble fusion for a live video feed. Each frame is run
//! through a general-purpose detector and a custom-trained (trusted) one;
//! their boxes are merged with Weighted Boxes Fusion, classified as
//! pickable or not, and the center of every fused box is streamed to a
//! downstream consumer as 8 bytes over one TCP connection.
//!
//! # Architecture
//!
//! The frame loop is single-threaded and synchronous:
//!
//! 1. **Acquire**: a [`FrameSource`] hands over one frame.
//! 2. **Detect**: every registered [`DetectionSource`] runs on it in order.
//! 3. **Normalize**: pixel boxes are divided by the frame dimensions.
//! 4. **Fuse**: [`FusionEngine`] clusters and merges across sources.
//! 5. **Tag and stream**: [`Tagger`] names each fused box and a
//!    [`CenterSink`] sends its center, highest score first.
//! 6. **Render**: a [`DisplaySink`] shows the annotated frame and may ask
//!    the loop to stop.
//!
//! Only a frame acquisition failure ends the loop. Detector, fusion,
//! lookup and send failures are logged and the next frame proceeds.
//!
//! # Module Structure
//!
//! - `frame`, `ingest`: frames and where they come from
//! - `detect`: detection types, the source seam, label tables, backends
//! - `normalize`, `fusion`, `tagger`: the per-frame computation
//! - `transport`: wire format and TCP sender
//! - `display`, `pipeline`: annotation and the frame loop
//! - `config`, `error`: startup settings and the error taxonomy

pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod fusion;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod tagger;
pub mod transport;

pub use config::{DetectorKind, DetectorSettings, FusiondConfig};
pub use detect::{
    BoundingBox, Detection, DetectionSource, LabelTable, RawDetection, SourceBatch, SourceId,
    SourceRole, SourceSet,
};
pub use display::{Annotation, Color, DisplaySink, LogDisplay};
pub use error::{AcquisitionError, DetectorError, FusionError, LookupError, NormalizeError};
pub use frame::{Frame, FrameSource, SourceStats};
pub use fusion::{FusedBox, FusionConfig, FusionEngine, FusionOutput, SourceContribution};
pub use ingest::{open_source, SourceConfig, SyntheticSource};
pub use pipeline::{FrameOutcome, Pipeline, PipelineState, PipelineStats};
pub use tagger::{PickCategory, Tag, Tagger, Vocabulary};
pub use transport::{
    CenterSink, SendOutcome, SendPolicy, SenderStats, StreamConfig, StreamMessage, TcpSender,
};
