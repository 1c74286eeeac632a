//! Annotated-frame rendering seam.
//!
//! The pipeline never draws pixels itself. It turns fused boxes into
//! [`Annotation`]s and hands them to a [`DisplaySink`], which is also
//! where a stop request comes from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::frame::Frame;
use crate::fusion::FusedBox;
use crate::normalize::to_pixel_rect;
use crate::tagger::Tag;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Pickable object named by the trusted source.
    Green,
    Red,
}

impl Color {
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            Color::Green => [0, 255, 0],
            Color::Red => [255, 0, 0],
        }
    }
}

/// One box as it is drawn on the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub fused: FusedBox,
    /// `None` when the label could not be resolved.
    pub tag: Option<Tag>,
    /// Pixel rectangle `(x0, y0, x1, y1)` on the rendered frame.
    pub rect: (i32, i32, i32, i32),
    pub color: Color,
    /// Fused score as a percentage, e.g. "87.50%".
    pub text: String,
}

impl Annotation {
    pub fn new(fused: FusedBox, tag: Option<Tag>, width: u32, height: u32) -> Self {
        let pickable = tag.as_ref().is_some_and(|t| t.is_pickable);
        let color = if pickable { Color::Green } else { Color::Red };
        let rect = to_pixel_rect(&fused.bbox, width, height);
        let text = format!("{:.2}%", fused.score * 100.0);
        Self {
            fused,
            tag,
            rect,
            color,
            text,
        }
    }

    pub fn is_pickable(&self) -> bool {
        self.color == Color::Green
    }
}

/// Where annotated frames go.
pub trait DisplaySink {
    /// Show one frame with its annotations. Errors are logged by the caller
    /// and do not stop the loop.
    fn render(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<()>;

    /// Polled once per frame, after rendering.
    fn stop_requested(&mut self) -> bool;
}

/// Headless sink: logs annotations at debug level and stops when its flag
/// is raised (the daemon raises it on Ctrl-C).
pub struct LogDisplay {
    stop: Arc<AtomicBool>,
    frames_rendered: u64,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::with_flag(Arc::new(AtomicBool::new(false)))
    }

    pub fn with_flag(stop: Arc<AtomicBool>) -> Self {
        Self {
            stop,
            frames_rendered: 0,
        }
    }

    /// Handle for requesting a stop from elsewhere (signal handler, tests).
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for LogDisplay {
    fn render(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<()> {
        self.frames_rendered += 1;
        for a in annotations {
            let class = a.tag.as_ref().map_or("?", |t| t.class_name.as_str());
            log::debug!(
                "frame {} {:?} {} {} at {:?}",
                frame.index,
                a.color,
                class,
                a.text,
                a.rect
            );
        }
        Ok(())
    }

    fn stop_requested(&mut self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn fused(score: f32) -> FusedBox {
        FusedBox {
            bbox: BoundingBox::new(0.25, 0.5, 0.5, 0.75),
            score,
            label: 10,
            label_source: 1,
            contributions: Vec::new(),
            members: 1,
        }
    }

    fn tag(is_pickable: bool) -> Tag {
        Tag {
            class_name: "pbottle".to_string(),
            source: 1,
            from_trusted: true,
            is_pickable,
        }
    }

    #[test]
    fn pickable_boxes_are_green_with_percentage_text() {
        let a = Annotation::new(fused(0.875), Some(tag(true)), 640, 480);
        assert_eq!(a.color, Color::Green);
        assert_eq!(a.text, "87.50%");
        assert_eq!(a.rect, (160, 240, 320, 360));
    }

    #[test]
    fn unpickable_and_unresolved_boxes_are_red() {
        assert_eq!(
            Annotation::new(fused(0.5), Some(tag(false)), 640, 480).color,
            Color::Red
        );
        let unresolved = Annotation::new(fused(0.5), None, 640, 480);
        assert_eq!(unresolved.color, Color::Red);
        assert!(!unresolved.is_pickable());
    }

    #[test]
    fn stop_flag_is_shared() -> Result<()> {
        let mut display = LogDisplay::new();
        let flag = display.stop_flag();
        display.render(&Frame::blank(2, 2, 1), &[])?;
        assert!(!display.stop_requested());
        flag.store(true, Ordering::SeqCst);
        assert!(display.stop_requested());
        assert_eq!(display.frames_rendered(), 1);
        Ok(())
    }
}
