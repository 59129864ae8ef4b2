use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use vello_cpu::kurbo::Shape as _;

use crate::{
    assets::PreparedImage,
    composition::tree::{Fill, NodeKind, RenderTree, TextBlock},
    foundation::{
        core::{FrameRgba, Rect, Rgba8},
        error::{LyricodeError, LyricodeResult},
    },
    render::{
        BoxStyle, CaptureBackend,
        text::{FontBook, TextBrushRgba8, TextLayoutEngine},
    },
};

/// Rasterizes render trees with `vello_cpu`.
pub struct CpuRasterizer {
    fonts: FontBook,
    /// Pixmaps keyed by the address of their source buffer. The weak handle tells a live
    /// entry from one whose buffer was freed and whose address may have been reused.
    image_cache: HashMap<usize, (Weak<Vec<u8>>, vello_cpu::Image)>,
    font_cache: HashMap<usize, vello_cpu::peniko::FontData>,
}

impl CpuRasterizer {
    pub fn new(fonts: FontBook) -> Self {
        Self {
            fonts,
            image_cache: HashMap::new(),
            font_cache: HashMap::new(),
        }
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    fn paint_tree(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        tree: &RenderTree,
        origin: (f64, f64),
        k: f64,
    ) -> LyricodeResult<()> {
        let content =
            vello_cpu::kurbo::Affine::translate(origin) * vello_cpu::kurbo::Affine::scale(k);
        let mut text_engine = None;
        let mut warned = false;

        for node in &tree.nodes {
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            match &node.kind {
                NodeKind::Shape {
                    rect,
                    corner_radius,
                    fill,
                } => {
                    ctx.set_transform(content);
                    self.fill_shape(ctx, *rect, *corner_radius, fill)?;
                }
                NodeKind::Text(block) => {
                    if block.text.is_empty() || block.is_invisible() {
                        continue;
                    }
                    let Some(font_bytes) = self.fonts.get(block.font).cloned() else {
                        if !warned {
                            tracing::warn!("no font configured, text layers are not rasterized");
                            warned = true;
                        }
                        continue;
                    };
                    let engine = text_engine.get_or_insert_with(TextLayoutEngine::new);
                    let font = self.font_data(&font_bytes);
                    let layout = engine.layout_block(block, &font_bytes, k as f32)?;
                    let at = vello_cpu::kurbo::Affine::translate((
                        origin.0 + block.origin.x * k,
                        origin.1 + block.origin.y * k,
                    ));
                    ctx.set_transform(at);
                    draw_layout(ctx, &layout, &font, block, k as f32);
                }
            }
        }
        Ok(())
    }

    fn fill_shape(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        rect: Rect,
        radius: f64,
        fill: &Fill,
    ) -> LyricodeResult<()> {
        let r = rect_to_cpu(rect);
        let path = vello_cpu::kurbo::RoundedRect::from_rect(r, radius).to_path(0.1);
        match fill {
            Fill::Solid(c) => {
                if c.is_transparent() {
                    return Ok(());
                }
                ctx.set_paint(color_to_cpu(*c));
                ctx.fill_path(&path);
            }
            Fill::Gradient(g) => {
                let mid = r.center().y;
                let gradient = vello_cpu::peniko::Gradient::new_linear((r.x0, mid), (r.x1, mid))
                    .with_stops([color_to_cpu(g.start), color_to_cpu(g.end)]);
                ctx.set_paint(gradient);
                ctx.fill_path(&path);
            }
            Fill::CoverImage(img) => {
                let paint = self.image_paint_for(img)?;
                let (iw, ih) = (f64::from(img.width), f64::from(img.height));
                let s = (r.width() / iw).max(r.height() / ih);
                let dx = r.x0 + (r.width() - iw * s) / 2.0;
                let dy = r.y0 + (r.height() - ih * s) / 2.0;

                let saved = *ctx.transform();
                ctx.push_clip_layer(&path);
                ctx.set_transform(
                    saved
                        * vello_cpu::kurbo::Affine::translate((dx, dy))
                        * vello_cpu::kurbo::Affine::scale(s),
                );
                ctx.set_paint(paint);
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
                ctx.set_transform(saved);
                ctx.pop_layer();
            }
        }
        Ok(())
    }

    fn image_paint_for(&mut self, img: &Arc<PreparedImage>) -> LyricodeResult<vello_cpu::Image> {
        let key = Arc::as_ptr(&img.rgba8_premul) as usize;
        if let Some((source, paint)) = self.image_cache.get(&key)
            && source
                .upgrade()
                .is_some_and(|live| Arc::ptr_eq(&live, &img.rgba8_premul))
        {
            return Ok(paint.clone());
        }
        let pixmap = image_premul_bytes_to_pixmap(&img.rgba8_premul, img.width, img.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.image_cache
            .insert(key, (Arc::downgrade(&img.rgba8_premul), paint.clone()));
        Ok(paint)
    }

    fn evict_dead_images(&mut self) {
        self.image_cache
            .retain(|_, (source, _)| source.strong_count() > 0);
    }

    fn font_data(&mut self, bytes: &Arc<Vec<u8>>) -> vello_cpu::peniko::FontData {
        let key = Arc::as_ptr(bytes) as usize;
        self.font_cache
            .entry(key)
            .or_insert_with(|| {
                vello_cpu::peniko::FontData::new(
                    vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
                    0,
                )
            })
            .clone()
    }
}

impl CaptureBackend for CpuRasterizer {
    #[tracing::instrument(level = "debug", skip_all, fields(kind = ?tree.kind, scale = scale))]
    fn capture(
        &mut self,
        tree: &RenderTree,
        style: &BoxStyle,
        scale: u32,
    ) -> LyricodeResult<FrameRgba> {
        if scale == 0 {
            return Err(LyricodeError::render("capture scale must be >= 1"));
        }
        let scale_f = f64::from(scale);
        let (outer_w, outer_h) = style.outer_size(tree);
        let px_w = (outer_w * scale_f).round();
        let px_h = (outer_h * scale_f).round();
        let width: u16 = to_u16(px_w, "capture width")?;
        let height: u16 = to_u16(px_h, "capture height")?;
        if width == 0 || height == 0 {
            return Err(LyricodeError::render("capture box is empty"));
        }

        let k = scale_f * style.content_width(tree) / tree.size.width;
        let inset = (style.margin + style.padding) * scale_f;
        self.evict_dead_images();
        let mut ctx = vello_cpu::RenderContext::new(width, height);

        if style.clip {
            let m = style.margin * scale_f;
            let clip = vello_cpu::kurbo::RoundedRect::new(
                m,
                m,
                px_w - m,
                px_h - m,
                style.corner_radius * scale_f,
            )
            .to_path(0.1);
            ctx.push_clip_layer(&clip);
            self.paint_tree(&mut ctx, tree, (inset, inset), k)?;
            ctx.pop_layer();
        } else {
            self.paint_tree(&mut ctx, tree, (inset, inset), k)?;
        }

        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        Ok(FrameRgba {
            width: u32::from(width),
            height: u32::from(height),
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrushRgba8>,
    font: &vello_cpu::peniko::FontData,
    block: &TextBlock,
    scale: f32,
) {
    let target_line = block.size_px * block.line_height * scale;
    for (index, line) in layout.lines().enumerate() {
        let extra = (target_line - line.metrics().line_height).max(0.0) * index as f32;
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };

            let brush = run.style().brush;
            if brush.a == 0 {
                continue;
            }
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));

            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y + extra,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}

fn to_u16(v: f64, what: &str) -> LyricodeResult<u16> {
    if !v.is_finite() || v < 0.0 || v > f64::from(u16::MAX) {
        return Err(LyricodeError::render(format!("{what} exceeds u16")));
    }
    Ok(v as u16)
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn color_to_cpu(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> LyricodeResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| LyricodeError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| LyricodeError::render("image height exceeds u16"))?;
    if Some(rgba8_premul.len()) != PreparedImage::byte_len(width, height) {
        return Err(LyricodeError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        background::{BackgroundRenderer, Surface},
        card::CardModel,
        composition::CompositionRenderer,
    };

    fn pixel(frame: &FrameRgba, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * frame.width + x) * 4) as usize;
        [
            frame.data[i],
            frame.data[i + 1],
            frame.data[i + 2],
            frame.data[i + 3],
        ]
    }

    fn lyric_tree() -> RenderTree {
        let card = CardModel::lyric();
        let paint = BackgroundRenderer::default().render(card.background(), Surface::Lyric);
        CompositionRenderer::default().layout(&card, &paint)
    }

    #[test]
    fn capture_is_scaled_square() {
        let mut r = CpuRasterizer::new(FontBook::empty());
        let frame = r.capture(&lyric_tree(), &BoxStyle::capture(600.0), 2).unwrap();
        assert_eq!((frame.width, frame.height), (1200, 1200));
        assert_eq!(frame.data.len(), 1200 * 1200 * 4);
        assert!(frame.premultiplied);
        // Gradient under the overlay reaches the corners when nothing clips.
        assert_eq!(pixel(&frame, 0, 0)[3], 255);
        assert_eq!(pixel(&frame, 1199, 1199)[3], 255);
    }

    #[test]
    fn preview_box_clips_corners() {
        let mut r = CpuRasterizer::new(FontBook::empty());
        let mut style = BoxStyle::preview();
        style.width = Some(100.0);
        let frame = r.capture(&lyric_tree(), &style, 1).unwrap();
        assert_eq!((frame.width, frame.height), (132, 132));
        assert_eq!(pixel(&frame, 0, 0)[3], 0);
        assert_eq!(pixel(&frame, 66, 66)[3], 255);
    }

    #[test]
    fn zero_scale_is_render_error() {
        let mut r = CpuRasterizer::new(FontBook::empty());
        let err = r.capture(&lyric_tree(), &BoxStyle::capture(600.0), 0).unwrap_err();
        assert!(matches!(err, LyricodeError::Render(_)));
    }

    fn image_tree(color: [u8; 4]) -> (RenderTree, Arc<PreparedImage>) {
        let img = Arc::new(PreparedImage {
            width: 2,
            height: 2,
            rgba8_premul: Arc::new(color.repeat(4)),
        });
        let paint = crate::background::PaintDescriptor::Image {
            source: img.clone(),
            fill: img.clone(),
            blurred: false,
        };
        let tree = CompositionRenderer::new(20.0).layout(&CardModel::code(), &paint);
        (tree, img)
    }

    #[test]
    fn image_cache_drops_freed_sources() {
        let mut r = CpuRasterizer::new(FontBook::empty());
        let style = BoxStyle::capture(20.0);
        for _ in 0..5 {
            let (tree, _img) = image_tree([200, 0, 0, 255]);
            r.capture(&tree, &style, 1).unwrap();
        }
        let (tree, img) = image_tree([0, 0, 200, 255]);
        let frame = r.capture(&tree, &style, 1).unwrap();
        assert_eq!(r.image_cache.len(), 1);
        assert!(r.image_cache.values().all(|(w, _)| w.strong_count() > 0));

        // Swapped images never reuse a stale pixmap.
        assert_eq!(pixel(&frame, 10, 0), [0, 0, 200, 255]);
        drop((tree, img));
    }

    #[test]
    fn pixmap_rejects_short_buffer() {
        assert!(image_premul_bytes_to_pixmap(&[0; 7], 1, 2).is_err());
        assert!(image_premul_bytes_to_pixmap(&[0; 8], 1, 2).is_ok());
    }
}
