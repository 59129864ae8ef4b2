use std::sync::Arc;

use crate::{
    background::PaintDescriptor,
    card::{CardContent, CardModel, CodeFields, LyricFields},
    composition::{
        highlight::{Highlighter, PlainHighlighter},
        tree::{
            Fill, FontRole, Node, NodeKind, NodeRole, RenderTree, StyledRange, TextAlign,
            TextBlock,
        },
    },
    foundation::core::{Point, Rect, Rgba8, Size},
};

pub const TITLE_PLACEHOLDER: &str = "Your Song Title";
pub const ARTIST_PLACEHOLDER: &str = "Artist Name";
pub const LYRICS_PLACEHOLDER: &str = "Your lyrics will appear here";
pub const CODE_PLACEHOLDER: &str = "// put your code here";

/// Languages offered by the code card editor.
pub const LANGUAGES: [&str; 13] = [
    "javascript",
    "typescript",
    "python",
    "java",
    "csharp",
    "cpp",
    "php",
    "ruby",
    "go",
    "swift",
    "rust",
    "html",
    "css",
];

/// File extension shown in the editor tab; unknown languages are plain text.
pub fn extension_for(language: &str) -> &'static str {
    match language {
        "javascript" => "js",
        "typescript" => "ts",
        "python" => "py",
        "html" => "html",
        "css" => "css",
        _ => "txt",
    }
}

pub fn filename_for(language: &str) -> String {
    format!("{}.{}", language.to_lowercase(), extension_for(language))
}

const EDITOR_BG: Rgba8 = Rgba8::opaque(0x1e, 0x1e, 0x1e);
const TAB_BG: Rgba8 = Rgba8::opaque(0x2d, 0x2d, 0x2d);
const LINE_NUMBER: Rgba8 = Rgba8::opaque(0x6b, 0x72, 0x80);
const CONTROL_COLORS: [Rgba8; 3] = [
    Rgba8::opaque(0xef, 0x44, 0x44),
    Rgba8::opaque(0xea, 0xb3, 0x08),
    Rgba8::opaque(0x22, 0xc5, 0x5e),
];

/// Lays a card out as a [`RenderTree`]. Pure: no I/O and no mutation of its inputs.
#[derive(Clone)]
pub struct CompositionRenderer {
    size: f64,
    highlighter: Arc<dyn Highlighter>,
}

impl std::fmt::Debug for CompositionRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionRenderer")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Default for CompositionRenderer {
    fn default() -> Self {
        Self::new(600.0)
    }
}

impl CompositionRenderer {
    pub fn new(size: f64) -> Self {
        Self {
            size,
            highlighter: Arc::new(PlainHighlighter::default()),
        }
    }

    pub fn with_highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.highlighter = highlighter;
        self
    }

    pub fn layout(&self, card: &CardModel, paint: &PaintDescriptor) -> RenderTree {
        let nodes = match card.content() {
            CardContent::Lyric(fields) => self.layout_lyric(fields, paint),
            CardContent::Code(fields) => self.layout_code(fields, paint),
        };
        RenderTree {
            kind: card.kind(),
            size: Size::new(self.size, self.size),
            nodes,
        }
    }

    fn layout_lyric(&self, fields: &LyricFields, paint: &PaintDescriptor) -> Vec<Node> {
        let s = self.size;
        let k = s / 600.0;
        let full = Rect::new(0.0, 0.0, s, s);

        let mut nodes = vec![
            shape(NodeRole::Background, full, 0.0, background_fill(paint)),
            shape(
                NodeRole::GlassOverlay,
                full,
                0.0,
                Fill::Solid(Rgba8::new(0, 0, 0, 77)),
            ),
        ];

        let pad_x = 32.0 * k;
        let pad_top = 40.0 * k;
        let avatar = Rect::new(pad_x, pad_top, pad_x + 64.0 * k, pad_top + 64.0 * k);
        nodes.push(shape(NodeRole::Avatar, avatar, 12.0 * k, avatar_fill(paint)));

        let artist = or_placeholder(&fields.artist, ARTIST_PLACEHOLDER);
        if paint.is_palette_gradient()
            && let Some(initial) = artist.chars().next()
        {
            let mut t = TextBlock::plain(
                initial.to_string(),
                Point::new(avatar.center().x - 9.0 * k, avatar.y0 + 14.0 * k),
                (30.0 * k) as f32,
                Rgba8::white(),
            );
            t.bold = true;
            nodes.push(text(NodeRole::AvatarInitial, t));
        }

        let header_x = avatar.x1 + 16.0 * k;
        let mut title = TextBlock::plain(
            or_placeholder(&fields.title, TITLE_PLACEHOLDER),
            Point::new(header_x, pad_top + 6.0 * k),
            (20.0 * k) as f32,
            Rgba8::white(),
        );
        title.bold = true;
        title.max_width = Some(s - header_x - pad_x);
        nodes.push(text(NodeRole::Title, title));

        let mut artist_block = TextBlock::plain(
            artist,
            Point::new(header_x, pad_top + 34.0 * k),
            (18.0 * k) as f32,
            Rgba8::white().with_opacity(0.6),
        );
        artist_block.max_width = Some(s - header_x - pad_x);
        nodes.push(text(NodeRole::Artist, artist_block));

        let mut lyrics = TextBlock::plain(
            or_placeholder(&fields.lyrics, LYRICS_PLACEHOLDER),
            Point::new(pad_x, avatar.y1 + 24.0 * k),
            (48.0 * k) as f32,
            Rgba8::white(),
        );
        lyrics.bold = true;
        lyrics.line_height = 1.375;
        lyrics.max_width = Some(s - 2.0 * pad_x);
        nodes.push(text(NodeRole::Lyrics, lyrics));

        nodes
    }

    fn layout_code(&self, fields: &CodeFields, paint: &PaintDescriptor) -> Vec<Node> {
        let s = self.size;
        let k = s / 600.0;

        let mut nodes = vec![shape(
            NodeRole::Background,
            Rect::new(0.0, 0.0, s, s),
            24.0 * k,
            background_fill(paint),
        )];

        let inset = s * 0.05;
        let panel = Rect::new(inset, inset, s - inset, s - inset);
        nodes.push(shape(
            NodeRole::EditorPanel,
            panel,
            16.0 * k,
            Fill::Solid(EDITOR_BG),
        ));

        let bar = Rect::new(panel.x0, panel.y0, panel.x1, panel.y0 + 36.0 * k);
        nodes.push(shape(NodeRole::TitleBar, bar, 0.0, Fill::Solid(EDITOR_BG)));

        let dot = 12.0 * k;
        let mut x = bar.x0 + 16.0 * k;
        let dot_y = bar.center().y - dot / 2.0;
        for color in CONTROL_COLORS {
            let r = Rect::new(x, dot_y, x + dot, dot_y + dot);
            nodes.push(shape(NodeRole::WindowControl, r, dot / 2.0, Fill::Solid(color)));
            x += dot + 8.0 * k;
        }

        let filename = filename_for(&fields.language);
        let tab_x = x + 8.0 * k;
        let tab_w = (filename.chars().count() as f64 * 7.5 + 24.0) * k;
        let tab = Rect::new(tab_x, bar.y0 + 6.0 * k, tab_x + tab_w, bar.y1);
        nodes.push(shape(NodeRole::FilenameTab, tab, 6.0 * k, Fill::Solid(TAB_BG)));
        nodes.push(text(
            NodeRole::FilenameLabel,
            TextBlock::plain(
                filename,
                Point::new(tab.x0 + 12.0 * k, tab.y0 + 7.0 * k),
                (12.0 * k) as f32,
                Rgba8::white(),
            ),
        ));

        // Body: the editable and colorized layers share one string so they cannot drift.
        let shared: Arc<str> = if fields.code.is_empty() {
            Arc::from(CODE_PLACEHOLDER)
        } else {
            Arc::from(fields.code.as_str())
        };
        let line_count = line_count(&fields.code);
        let digits = line_count.to_string().len() as f64;
        let body_top = bar.y1 + 16.0 * k;
        let gutter_x = panel.x0 + 16.0 * k;
        let gutter_w = (digits * 10.0) * k;
        let code_x = gutter_x + gutter_w + 16.0 * k;
        let code_size = (16.0 * k) as f32;

        let numbers = (1..=line_count)
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let mut gutter = TextBlock::plain(
            numbers,
            Point::new(gutter_x, body_top),
            code_size,
            LINE_NUMBER,
        );
        gutter.font = FontRole::Mono;
        gutter.align = TextAlign::End;
        gutter.max_width = Some(gutter_w);
        gutter.line_height = 1.5;
        nodes.push(text(NodeRole::LineNumbers, gutter));

        let body_width = panel.x1 - 16.0 * k - code_x;
        let code_block = |spans: Vec<StyledRange>| TextBlock {
            text: shared.clone(),
            spans,
            origin: Point::new(code_x, body_top),
            max_width: Some(body_width),
            size_px: code_size,
            line_height: 1.5,
            bold: false,
            font: FontRole::Mono,
            align: TextAlign::Start,
        };

        let colorized = sanitize_spans(
            self.highlighter.highlight(&fields.language, &shared),
            &shared,
        );
        nodes.push(text(NodeRole::CodeColorized, code_block(colorized)));
        nodes.push(text(
            NodeRole::CodeInput,
            code_block(vec![StyledRange {
                range: 0..shared.len(),
                color: Rgba8::transparent(),
            }]),
        ));

        nodes
    }
}

/// Number of editor lines; an empty body still shows line 1.
pub fn line_count(code: &str) -> usize {
    code.split('\n').count().max(1)
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_owned()
    } else {
        value.to_owned()
    }
}

fn background_fill(paint: &PaintDescriptor) -> Fill {
    match paint {
        PaintDescriptor::Image { fill, .. } => Fill::CoverImage(fill.clone()),
        PaintDescriptor::Gradient { gradient, .. } => Fill::Gradient(*gradient),
    }
}

// The avatar shows the crisp upload, never the blurred backdrop.
fn avatar_fill(paint: &PaintDescriptor) -> Fill {
    match paint {
        PaintDescriptor::Image { source, .. } => Fill::CoverImage(source.clone()),
        PaintDescriptor::Gradient { gradient, .. } => Fill::Gradient(*gradient),
    }
}

// Drop ranges a highlighter got wrong instead of letting them reach the shaper.
fn sanitize_spans(spans: Vec<StyledRange>, text: &str) -> Vec<StyledRange> {
    spans
        .into_iter()
        .filter(|s| {
            s.range.start <= s.range.end
                && s.range.end <= text.len()
                && text.is_char_boundary(s.range.start)
                && text.is_char_boundary(s.range.end)
        })
        .collect()
}

fn shape(role: NodeRole, rect: Rect, corner_radius: f64, fill: Fill) -> Node {
    Node {
        role,
        kind: NodeKind::Shape {
            rect,
            corner_radius,
            fill,
        },
    }
}

fn text(role: NodeRole, block: TextBlock) -> Node {
    Node {
        role,
        kind: NodeKind::Text(block),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        background::{BackgroundRenderer, GradientId, GradientPalette, Surface},
        card::CardModel,
    };

    fn paint_for(card: &CardModel, surface: Surface) -> PaintDescriptor {
        BackgroundRenderer::default().render(card.background(), surface)
    }

    #[test]
    fn lyric_without_background_uses_default_gradient() {
        let mut card = CardModel::lyric();
        card.set_title("Home");
        card.set_lyrics("la la la");
        let tree = CompositionRenderer::default().layout(&card, &paint_for(&card, Surface::Lyric));

        assert_eq!(
            tree.fill(NodeRole::Background),
            Some(&Fill::Gradient(GradientPalette::DEFAULT))
        );
        assert_eq!(&*tree.text(NodeRole::Title).unwrap().text, "Home");
        assert_eq!(&*tree.text(NodeRole::Lyrics).unwrap().text, "la la la");
        assert_eq!(&*tree.text(NodeRole::Artist).unwrap().text, ARTIST_PLACEHOLDER);
        assert_eq!(tree.size, Size::new(600.0, 600.0));
        assert!(tree.find(NodeRole::AvatarInitial).is_none());
    }

    #[test]
    fn overlay_sits_above_background() {
        let card = CardModel::lyric();
        let tree = CompositionRenderer::default().layout(&card, &paint_for(&card, Surface::Lyric));
        let pos = |role| tree.nodes.iter().position(|n| n.role == role).unwrap();
        assert!(pos(NodeRole::Background) < pos(NodeRole::GlassOverlay));
        assert!(pos(NodeRole::GlassOverlay) < pos(NodeRole::Lyrics));
    }

    #[test]
    fn palette_gradient_shows_artist_initial() {
        let mut card = CardModel::lyric();
        card.set_artist("Queen");
        card.set_gradient(GradientId::Mesh1);
        let tree = CompositionRenderer::default().layout(&card, &paint_for(&card, Surface::Lyric));
        assert_eq!(&*tree.text(NodeRole::AvatarInitial).unwrap().text, "Q");
    }

    #[test]
    fn empty_python_card_shows_tab_and_placeholder_in_both_layers() {
        let mut card = CardModel::code();
        card.set_language("python");
        let tree = CompositionRenderer::default().layout(&card, &paint_for(&card, Surface::Code));

        assert_eq!(&*tree.text(NodeRole::FilenameLabel).unwrap().text, "python.py");
        let input = tree.text(NodeRole::CodeInput).unwrap();
        let colored = tree.text(NodeRole::CodeColorized).unwrap();
        assert_eq!(&*input.text, CODE_PLACEHOLDER);
        assert_eq!(&*colored.text, CODE_PLACEHOLDER);
        assert!(Arc::ptr_eq(&input.text, &colored.text));
        assert!(input.is_invisible());
        assert!(!colored.is_invisible());
        assert_eq!(&*tree.text(NodeRole::LineNumbers).unwrap().text, "1");
    }

    #[test]
    fn input_layer_is_painted_over_colorized_layer() {
        let mut card = CardModel::code();
        card.set_code("a\nb\nc");
        let tree = CompositionRenderer::default().layout(&card, &paint_for(&card, Surface::Code));
        let pos = |role| tree.nodes.iter().position(|n| n.role == role).unwrap();
        assert!(pos(NodeRole::CodeColorized) < pos(NodeRole::CodeInput));
        assert_eq!(&*tree.text(NodeRole::LineNumbers).unwrap().text, "1\n2\n3");
        assert_eq!(tree.find_all(NodeRole::WindowControl).count(), 3);
    }

    #[test]
    fn extension_table_and_unknown_language() {
        assert_eq!(filename_for("javascript"), "javascript.js");
        assert_eq!(filename_for("typescript"), "typescript.ts");
        assert_eq!(filename_for("rust"), "rust.txt");
        assert_eq!(filename_for("Cobol"), "cobol.txt");
        assert!(LANGUAGES.contains(&"csharp"));
    }

    #[test]
    fn bad_highlighter_spans_are_dropped() {
        struct Broken;
        impl Highlighter for Broken {
            fn highlight(&self, _: &str, text: &str) -> Vec<StyledRange> {
                vec![
                    StyledRange {
                        range: 0..text.len() + 10,
                        color: Rgba8::white(),
                    },
                    StyledRange {
                        range: 0..2,
                        color: Rgba8::opaque(1, 2, 3),
                    },
                ]
            }
        }

        let mut card = CardModel::code();
        card.set_code("let x");
        let tree = CompositionRenderer::default()
            .with_highlighter(Arc::new(Broken))
            .layout(&card, &paint_for(&card, Surface::Code));
        let spans = &tree.text(NodeRole::CodeColorized).unwrap().spans;
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].range, 0..2);
    }

    #[test]
    fn layout_is_pure() {
        let mut card = CardModel::code();
        card.set_code("x = 1");
        card.set_gradient(GradientId::Mesh4);
        let before = card.clone();
        let paint = paint_for(&card, Surface::Code);
        let r = CompositionRenderer::default();
        assert_eq!(r.layout(&card, &paint), r.layout(&card, &paint));
        assert_eq!(card, before);
    }
}
