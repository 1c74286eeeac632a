use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::detect::labels::LabelTable;
use crate::detect::result::RawDetection;
use crate::detect::source::{DetectionSource, SourceRole};
use crate::frame::Frame;

/// One recorded row: `[xmin, ymin, xmax, ymax, score, label]` in pixels.
type Row = [f32; 6];

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Tagged { detections: Vec<Row> },
    Bare(Vec<Row>),
}

/// Replays recorded detector output.
///
/// The recording is JSON lines, one frame per line. Frame `n` (1-based)
/// replays line `(n - 1) % lines`, so a short recording loops over a long
/// stream. Blank lines are frames with no detections.
pub struct ReplaySource {
    name: String,
    role: SourceRole,
    labels: LabelTable,
    frames: Vec<Vec<RawDetection>>,
}

impl ReplaySource {
    pub fn open(
        name: impl Into<String>,
        role: SourceRole,
        labels: LabelTable,
        path: &Path,
    ) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;
        let frames = parse_recording(&raw)
            .with_context(|| format!("invalid replay file {}", path.display()))?;
        Ok(Self::from_frames(name, role, labels, frames))
    }

    pub fn from_frames(
        name: impl Into<String>,
        role: SourceRole,
        labels: LabelTable,
        frames: Vec<Vec<RawDetection>>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            labels,
            frames,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

fn parse_recording(raw: &str) -> Result<Vec<Vec<RawDetection>>> {
    let mut frames = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            frames.push(Vec::new());
            continue;
        }
        let parsed: ReplayLine = serde_json::from_str(line)
            .map_err(|e| anyhow!("line {}: {}", lineno + 1, e))?;
        let rows = match parsed {
            ReplayLine::Tagged { detections } => detections,
            ReplayLine::Bare(rows) => rows,
        };
        let detections = rows
            .iter()
            .map(|row| row_to_detection(row).map_err(|e| anyhow!("line {}: {}", lineno + 1, e)))
            .collect::<Result<Vec<_>>>()?;
        frames.push(detections);
    }
    Ok(frames)
}

fn row_to_detection(row: &Row) -> Result<RawDetection> {
    let [xmin, ymin, xmax, ymax, score, label] = *row;
    if !(label >= 0.0 && label.fract() == 0.0 && label <= u32::MAX as f32) {
        return Err(anyhow!("label {} is not a class id", label));
    }
    Ok(RawDetection::new(xmin, ymin, xmax, ymax, score, label as u32))
}

impl DetectionSource for ReplaySource {
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
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        let slot = (frame.index.saturating_sub(1) % self.frames.len() as u64) as usize;
        Ok(self.frames[slot].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn replays_lines_in_order_and_loops() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, r#"{{"detections": [[10, 20, 30, 40, 0.9, 2]]}}"#)?;
        writeln!(file)?;
        writeln!(file, r#"[[1, 2, 3, 4, 0.5, 0], [5, 6, 7, 8, 0.4, 1]]"#)?;

        let mut source =
            ReplaySource::open("rec", SourceRole::Trusted, LabelTable::debris(), file.path())?;
        assert_eq!(source.frame_count(), 3);

        let first = source.detect(&Frame::blank(4, 4, 1))?;
        assert_eq!(first, vec![RawDetection::new(10.0, 20.0, 30.0, 40.0, 0.9, 2)]);
        assert!(source.detect(&Frame::blank(4, 4, 2))?.is_empty());
        assert_eq!(source.detect(&Frame::blank(4, 4, 3))?.len(), 2);
        assert_eq!(source.detect(&Frame::blank(4, 4, 4))?, first);
        Ok(())
    }

    #[test]
    fn rejects_fractional_labels() {
        assert!(parse_recording("[[1, 2, 3, 4, 0.5, 1.5]]").is_err());
        assert!(parse_recording("[[1, 2, 3, 4, 0.5, -1]]").is_err());
        assert!(parse_recording("not json").is_err());
    }
}
