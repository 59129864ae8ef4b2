use crate::{composition::tree::StyledRange, foundation::core::Rgba8};

/// Colors code text for the read-only layer of the code card.
///
/// Real grammars live outside this crate; anything that can split text into colored byte
/// ranges plugs in here. Ranges must lie on `char` boundaries.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, language: &str, text: &str) -> Vec<StyledRange>;
}

/// Single-color highlighter.
#[derive(Clone, Copy, Debug)]
pub struct PlainHighlighter {
    pub color: Rgba8,
}

impl Default for PlainHighlighter {
    fn default() -> Self {
        Self {
            color: Rgba8::white(),
        }
    }
}

impl Highlighter for PlainHighlighter {
    fn highlight(&self, _language: &str, text: &str) -> Vec<StyledRange> {
        vec![StyledRange {
            range: 0..text.len(),
            color: self.color,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_covers_whole_text() {
        let spans = PlainHighlighter::default().highlight("rust", "fn main() {}");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].range, 0..12);
        assert_eq!(spans[0].color, Rgba8::white());
    }
}
