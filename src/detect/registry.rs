use anyhow::{anyhow, Result};

use crate::detect::result::{RawDetection, SourceId};
use crate::detect::source::{DetectionSource, SourceRole};
use crate::error::DetectorError;
use crate::frame::Frame;
use crate::tagger::Vocabulary;

struct Registered {
    source: Box<dyn DetectionSource>,
    weight: f32,
}

/// Ordered set of detection sources.
///
/// Registration order is the `SourceId` order the fusion engine sees and
/// the order detectors run in. At most one source may hold the trusted role.
pub struct SourceSet {
    sources: Vec<Registered>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a source with its reliability weight. Returns its id.
    pub fn register<S: DetectionSource + 'static>(
        &mut self,
        source: S,
        weight: f32,
    ) -> Result<SourceId> {
        self.register_boxed(Box::new(source), weight)
    }

    pub fn register_boxed(
        &mut self,
        source: Box<dyn DetectionSource>,
        weight: f32,
    ) -> Result<SourceId> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(anyhow!(
                "source '{}' weight must be finite and > 0 (got {})",
                source.name(),
                weight
            ));
        }
        if source.role() == SourceRole::Trusted && self.trusted().is_some() {
            return Err(anyhow!(
                "source '{}' cannot be trusted: a trusted source is already registered",
                source.name()
            ));
        }
        self.sources.push(Registered { source, weight });
        Ok(self.sources.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn weight(&self, id: SourceId) -> Option<f32> {
        self.sources.get(id).map(|r| r.weight)
    }

    pub fn role(&self, id: SourceId) -> Option<SourceRole> {
        self.sources.get(id).map(|r| r.source.role())
    }

    /// Id of the trusted source, when one is registered.
    pub fn trusted(&self) -> Option<SourceId> {
        self.sources
            .iter()
            .position(|r| r.source.role() == SourceRole::Trusted)
    }

    /// Per-source vocabularies for the tagger, indexed by source id.
    pub fn vocabularies(&self) -> Vec<Vocabulary<'_>> {
        self.sources
            .iter()
            .map(|r| Vocabulary {
                name: r.source.name(),
                role: r.source.role(),
                labels: r.source.labels(),
            })
            .collect()
    }

    /// List registered sources as `name (role, weight)`.
    pub fn list(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|r| {
                format!(
                    "{} ({}, weight {})",
                    r.source.name(),
                    r.source.role().as_str(),
                    r.weight
                )
            })
            .collect()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        for registered in &mut self.sources {
            registered.source.warm_up().map_err(|e| {
                anyhow!("warm-up of source '{}' failed: {}", registered.source.name(), e)
            })?;
        }
        Ok(())
    }

    /// Run every source on the frame, in registration order.
    ///
    /// The first failure aborts the frame; there is no retry.
    pub fn detect_all(&mut self, frame: &Frame) -> Result<Vec<Vec<RawDetection>>, DetectorError> {
        let mut outputs = Vec::with_capacity(self.sources.len());
        for registered in &mut self.sources {
            let detections = registered
                .source
                .detect(frame)
                .map_err(|cause| DetectorError {
                    detector: registered.source.name().to_string(),
                    cause,
                })?;
            outputs.push(detections);
        }
        Ok(outputs)
    }
}

impl Default for SourceSet {
    fn default() -> Self {
        Self::new()
    }
}
