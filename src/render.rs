pub mod cpu;
pub mod text;

use crate::{
    composition::tree::RenderTree,
    foundation::{core::FrameRgba, error::LyricodeResult},
};

pub use cpu::CpuRasterizer;
pub use text::{FontBook, TextBrushRgba8, TextLayoutEngine};

/// Outer box the card tree is mounted in.
///
/// Live previews size the box responsively; capture pins it to a fixed square.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxStyle {
    /// Content width in logical px. `None` follows the tree's own width.
    pub width: Option<f64>,
    pub margin: f64,
    pub padding: f64,
    /// Clip content to the box's rounded rect.
    pub clip: bool,
    pub corner_radius: f64,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            width: None,
            margin: 0.0,
            padding: 0.0,
            clip: false,
            corner_radius: 0.0,
        }
    }
}

impl BoxStyle {
    /// The preview container: responsive width, rounded and clipped, with breathing room.
    pub fn preview() -> Self {
        Self {
            width: None,
            margin: 16.0,
            padding: 0.0,
            clip: true,
            corner_radius: 24.0,
        }
    }

    /// Export box: exactly `width` wide, no margins, no clipping.
    ///
    /// The captured frame is the box itself, so the card sits centered in it.
    pub fn capture(width: f64) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    pub fn content_width(&self, tree: &RenderTree) -> f64 {
        self.width.unwrap_or(tree.size.width)
    }

    /// Outer logical size `(width, height)` of the box holding `tree`.
    pub fn outer_size(&self, tree: &RenderTree) -> (f64, f64) {
        let w = self.content_width(tree);
        let h = if tree.size.width > 0.0 {
            tree.size.height * w / tree.size.width
        } else {
            0.0
        };
        let inset = 2.0 * (self.margin + self.padding);
        (w + inset, h + inset)
    }
}

/// Something that can turn a mounted tree into pixels.
pub trait CaptureBackend: Send {
    fn capture(&mut self, tree: &RenderTree, style: &BoxStyle, scale: u32)
    -> LyricodeResult<FrameRgba>;
}
