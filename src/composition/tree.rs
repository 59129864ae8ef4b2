use std::{ops::Range, sync::Arc};

use crate::{
    assets::PreparedImage,
    background::LinearGradient,
    card::CardKind,
    foundation::core::{Point, Rect, Rgba8, Size},
};

/// What a node is for; stable handle for lookups and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Background,
    GlassOverlay,
    Avatar,
    AvatarInitial,
    Title,
    Artist,
    Lyrics,
    EditorPanel,
    TitleBar,
    WindowControl,
    FilenameTab,
    FilenameLabel,
    LineNumbers,
    /// Transparent layer that receives keystrokes.
    CodeInput,
    /// Colorized read-only rendering of the same text.
    CodeColorized,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Fill {
    Solid(Rgba8),
    Gradient(LinearGradient),
    /// Image scaled to cover the shape, centered, cropped by the shape.
    CoverImage(Arc<PreparedImage>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontRole {
    Sans,
    Mono,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlign {
    Start,
    End,
}

/// A colored byte range of a [`TextBlock`]'s text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledRange {
    pub range: Range<usize>,
    pub color: Rgba8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub text: Arc<str>,
    pub spans: Vec<StyledRange>,
    pub origin: Point,
    pub max_width: Option<f64>,
    pub size_px: f32,
    pub line_height: f32,
    pub bold: bool,
    pub font: FontRole,
    pub align: TextAlign,
}

impl TextBlock {
    pub fn plain(text: impl Into<Arc<str>>, origin: Point, size_px: f32, color: Rgba8) -> Self {
        let text = text.into();
        let spans = vec![StyledRange {
            range: 0..text.len(),
            color,
        }];
        Self {
            text,
            spans,
            origin,
            max_width: None,
            size_px,
            line_height: 1.2,
            bold: false,
            font: FontRole::Sans,
            align: TextAlign::Start,
        }
    }

    /// `true` when no span would leave a visible mark.
    pub fn is_invisible(&self) -> bool {
        self.spans.iter().all(|s| s.color.is_transparent())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Shape {
        rect: Rect,
        corner_radius: f64,
        fill: Fill,
    },
    Text(TextBlock),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub role: NodeRole,
    pub kind: NodeKind,
}

/// Output of the composition layout, painted back to front.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderTree {
    pub kind: CardKind,
    /// Logical card size; rasterizers scale from here.
    pub size: Size,
    pub nodes: Vec<Node>,
}

impl RenderTree {
    pub fn find(&self, role: NodeRole) -> Option<&Node> {
        self.nodes.iter().find(|n| n.role == role)
    }

    pub fn find_all(&self, role: NodeRole) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.role == role)
    }

    pub fn text(&self, role: NodeRole) -> Option<&TextBlock> {
        match &self.find(role)?.kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Shape { .. } => None,
        }
    }

    pub fn fill(&self, role: NodeRole) -> Option<&Fill> {
        match &self.find(role)?.kind {
            NodeKind::Shape { fill, .. } => Some(fill),
            NodeKind::Text(_) => None,
        }
    }
}
