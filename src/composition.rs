pub mod highlight;
pub mod layout;
pub mod tree;

pub use highlight::{Highlighter, PlainHighlighter};
pub use layout::{CompositionRenderer, extension_for, filename_for};
pub use tree::{
    Fill, FontRole, Node, NodeKind, NodeRole, RenderTree, StyledRange, TextAlign, TextBlock,
};
