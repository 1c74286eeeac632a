//! Frame loop orchestrator.
//!
//! One frame at a time, synchronously:
//! `AwaitFrame → RunDetectors → Normalize → Fuse → AnnotateAndStream →
//! Render → AwaitFrame`, ending in `Stopped` at end of stream, on a stop
//! request, or on an acquisition failure. A stop request is only honored
//! between frames.
//!
//! Every collaborator is passed in at construction, so the loop runs the
//! same against real detectors and a TCP consumer as against fakes.

use std::time::{Duration, Instant};

use crate::detect::{SourceBatch, SourceSet};
use crate::display::{Annotation, DisplaySink};
use crate::error::AcquisitionError;
use crate::frame::{Frame, FrameSource};
use crate::fusion::FusionEngine;
use crate::normalize::normalize_all;
use crate::tagger::Tagger;
use crate::transport::{CenterSink, SenderStats, StreamMessage};

pub const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    AwaitFrame,
    RunDetectors,
    Normalize,
    Fuse,
    AnnotateAndStream,
    Render,
    Stopped,
}

/// What one call to [`Pipeline::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame went through fusion; `boxes` fused boxes were tagged and sent.
    Processed { boxes: usize },
    /// A detector or the normalizer failed; nothing was fused or sent.
    Skipped,
    /// No frame was taken: the loop has stopped.
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub boxes_fused: u64,
    pub detections_rejected: u64,
    pub lookup_failures: u64,
    pub render_failures: u64,
    pub sends: SenderStats,
}

pub struct Pipeline<F, S, D> {
    source: F,
    detectors: SourceSet,
    engine: FusionEngine,
    tagger: Tagger,
    sink: S,
    display: D,
    state: PipelineState,
    stats: PipelineStats,
    last_health_log: Instant,
}

impl<F, S, D> Pipeline<F, S, D>
where
    F: FrameSource,
    S: CenterSink,
    D: DisplaySink,
{
    /// `source` must already be connected.
    pub fn new(
        source: F,
        detectors: SourceSet,
        engine: FusionEngine,
        tagger: Tagger,
        sink: S,
        display: D,
    ) -> Self {
        Self {
            source,
            detectors,
            engine,
            tagger,
            sink,
            display,
            state: PipelineState::AwaitFrame,
            stats: PipelineStats::default(),
            last_health_log: Instant::now(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn detectors(&self) -> &SourceSet {
        &self.detectors
    }

    /// Ask the loop to stop before the next frame.
    pub fn stop(&mut self) {
        self.enter(PipelineState::Stopped);
    }

    /// Run until end of stream or a stop request.
    ///
    /// Only an acquisition failure is returned as an error; everything
    /// else is logged and the loop moves on to the next frame.
    pub fn run(&mut self) -> Result<PipelineStats, AcquisitionError> {
        while self.state != PipelineState::Stopped {
            self.step()?;
        }
        self.log_summary();
        Ok(self.stats)
    }

    /// Process a single frame.
    pub fn step(&mut self) -> Result<FrameOutcome, AcquisitionError> {
        if self.state == PipelineState::Stopped {
            return Ok(FrameOutcome::Stopped);
        }

        self.enter(PipelineState::AwaitFrame);
        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!(
                    "frame source exhausted after {} frames",
                    self.source.stats().frames_captured
                );
                self.enter(PipelineState::Stopped);
                return Ok(FrameOutcome::Stopped);
            }
            Err(e) => {
                self.enter(PipelineState::Stopped);
                return Err(AcquisitionError(e));
            }
        };

        let outcome = match self.process(&frame) {
            Some(annotations) => {
                let boxes = annotations.len();
                self.stats.frames_processed += 1;
                self.stats.boxes_fused += boxes as u64;
                self.render(&frame, &annotations);
                FrameOutcome::Processed { boxes }
            }
            None => {
                self.stats.frames_skipped += 1;
                self.render(&frame, &[]);
                FrameOutcome::Skipped
            }
        };

        self.maybe_log_health();

        if self.display.stop_requested() {
            log::info!("stop requested after frame {}", frame.index);
            self.enter(PipelineState::Stopped);
        } else {
            self.enter(PipelineState::AwaitFrame);
        }
        Ok(outcome)
    }

    /// Detect, normalize, fuse, tag and stream. `None` skips the frame.
    fn process(&mut self, frame: &Frame) -> Option<Vec<Annotation>> {
        self.enter(PipelineState::RunDetectors);
        let outputs = match self.detectors.detect_all(frame) {
            Ok(outputs) => outputs,
            Err(e) => {
                log::warn!("frame {} skipped: {}", frame.index, e);
                return None;
            }
        };

        self.enter(PipelineState::Normalize);
        let mut batches = Vec::with_capacity(outputs.len());
        for (id, raw) in outputs.iter().enumerate() {
            let detections = match normalize_all(raw, id, frame.width, frame.height) {
                Ok(detections) => detections,
                Err(e) => {
                    log::warn!("frame {} skipped: {}", frame.index, e);
                    return None;
                }
            };
            let weight = self.detectors.weight(id).unwrap_or(1.0);
            batches.push(SourceBatch::new(weight, detections));
        }

        self.enter(PipelineState::Fuse);
        let fused = self.engine.fuse(&batches);
        for rejected in &fused.rejected {
            log::warn!("frame {}: {}", frame.index, rejected);
        }
        self.stats.detections_rejected += fused.rejected.len() as u64;

        self.enter(PipelineState::AnnotateAndStream);
        let vocabularies = self.detectors.vocabularies();
        let mut annotations = Vec::with_capacity(fused.boxes.len());
        for fused_box in fused.boxes {
            let tag = match self.tagger.tag(&fused_box, &vocabularies) {
                Ok(tag) => Some(tag),
                Err(e) => {
                    log::warn!("frame {}: {}; treating box as not pickable", frame.index, e);
                    self.stats.lookup_failures += 1;
                    None
                }
            };
            let outcome = self.sink.send(StreamMessage::from_fused(&fused_box));
            self.stats.sends.record(outcome);
            annotations.push(Annotation::new(fused_box, tag, frame.width, frame.height));
        }

        log::debug!(
            "frame {}: {} fused boxes ({} skipped below threshold)",
            frame.index,
            annotations.len(),
            fused.skipped
        );
        Some(annotations)
    }

    fn render(&mut self, frame: &Frame, annotations: &[Annotation]) {
        self.enter(PipelineState::Render);
        if let Err(e) = self.display.render(frame, annotations) {
            self.stats.render_failures += 1;
            log::warn!("render of frame {} failed: {}", frame.index, e);
        }
    }

    fn enter(&mut self, state: PipelineState) {
        log::trace!("pipeline {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn maybe_log_health(&mut self) {
        if self.last_health_log.elapsed() < HEALTH_LOG_INTERVAL {
            return;
        }
        let source = self.source.stats();
        log::info!(
            "source health={} frames={} url={} processed={} skipped={} fused={} sent={} reconnected={} dropped={}",
            self.source.is_healthy(),
            source.frames_captured,
            source.url,
            self.stats.frames_processed,
            self.stats.frames_skipped,
            self.stats.boxes_fused,
            self.stats.sends.sent,
            self.stats.sends.reconnected,
            self.stats.sends.dropped
        );
        self.last_health_log = Instant::now();
    }

    fn log_summary(&self) {
        log::info!(
            "pipeline stopped: processed={} skipped={} fused={} rejected={} lookup_failures={} sent={} reconnected={} dropped={}",
            self.stats.frames_processed,
            self.stats.frames_skipped,
            self.stats.boxes_fused,
            self.stats.detections_rejected,
            self.stats.lookup_failures,
            self.stats.sends.sent,
            self.stats.sends.reconnected,
            self.stats.sends.dropped
        );
    }
}
