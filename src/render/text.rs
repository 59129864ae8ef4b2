use std::{borrow::Cow, path::Path, sync::Arc};

use crate::{
    composition::tree::{FontRole, TextAlign, TextBlock},
    foundation::{
        core::Rgba8,
        error::{LyricodeError, LyricodeResult},
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<Rgba8> for TextBrushRgba8 {
    fn from(c: Rgba8) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// Raw font files for the two card typefaces.
#[derive(Clone, Debug, Default)]
pub struct FontBook {
    sans: Option<Arc<Vec<u8>>>,
    mono: Option<Arc<Vec<u8>>>,
}

impl FontBook {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_sans(mut self, bytes: Vec<u8>) -> Self {
        self.sans = Some(Arc::new(bytes));
        self
    }

    pub fn with_mono(mut self, bytes: Vec<u8>) -> Self {
        self.mono = Some(Arc::new(bytes));
        self
    }

    /// Reads whichever font files are configured. A missing mono face falls back to sans.
    pub fn load(sans: Option<&Path>, mono: Option<&Path>) -> LyricodeResult<Self> {
        let read = |p: &Path| {
            std::fs::read(p).map_err(|e| {
                LyricodeError::validation(format!("read font '{}': {e}", p.display()))
            })
        };
        let mut book = Self::empty();
        if let Some(p) = sans {
            book = book.with_sans(read(p)?);
        }
        if let Some(p) = mono {
            book = book.with_mono(read(p)?);
        }
        Ok(book)
    }

    pub fn get(&self, role: FontRole) -> Option<&Arc<Vec<u8>>> {
        match role {
            FontRole::Sans => self.sans.as_ref(),
            FontRole::Mono => self.mono.as_ref().or(self.sans.as_ref()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sans.is_none() && self.mono.is_none()
    }
}

/// Stateful helper for building Parley text layouts from raw font bytes.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape a block at `scale`, coloring each styled range with its own brush.
    pub fn layout_block(
        &mut self,
        block: &TextBlock,
        font_bytes: &[u8],
        scale: f32,
    ) -> LyricodeResult<parley::Layout<TextBrushRgba8>> {
        let size_px = block.size_px * scale;
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(LyricodeError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            LyricodeError::validation("no font families registered from font bytes")
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| LyricodeError::validation("registered font family has no name"))?
            .to_string();

        let text: &str = &block.text;
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(TextBrushRgba8::default()));
        if block.bold {
            builder.push_default(parley::style::StyleProperty::FontWeight(
                parley::style::FontWeight::BOLD,
            ));
        }
        for span in &block.spans {
            builder.push(
                parley::style::StyleProperty::Brush(span.color.into()),
                span.range.clone(),
            );
        }

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        let max_width = block.max_width.map(|w| w as f32 * scale);
        layout.break_all_lines(max_width);
        let alignment = match block.align {
            TextAlign::Start => parley::Alignment::Start,
            TextAlign::End => parley::Alignment::End,
        };
        layout.align(max_width, alignment, parley::AlignmentOptions::default());
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_falls_back_to_sans() {
        let book = FontBook::empty().with_sans(vec![1, 2, 3]);
        assert_eq!(book.get(FontRole::Mono).map(|b| b.len()), Some(3));
        assert!(FontBook::empty().get(FontRole::Sans).is_none());
        assert!(FontBook::empty().is_empty());
    }

    #[test]
    fn missing_font_file_is_validation_error() {
        let err = FontBook::load(Some(Path::new("/definitely/not/here.ttf")), None).unwrap_err();
        assert!(matches!(err, LyricodeError::Validation(_)));
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let block = TextBlock::plain(
            "hi",
            crate::foundation::core::Point::ZERO,
            12.0,
            Rgba8::white(),
        );
        let mut engine = TextLayoutEngine::new();
        assert!(engine.layout_block(&block, b"not a font", 1.0).is_err());
    }
}
