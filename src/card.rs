use crate::{assets::data_uri::EncodedImage, background::GradientId};

/// Character cap on the free-text body of a card (lyrics or code).
pub const MAX_BODY_CHARS: usize = 500;

pub const DEFAULT_LANGUAGE: &str = "javascript";

/// What backs a card. Exactly one variant is ever held.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BackgroundSpec {
    #[default]
    None,
    UploadedImage(EncodedImage),
    Gradient(GradientId),
}

impl BackgroundSpec {
    pub fn uploaded_image(&self) -> Option<&EncodedImage> {
        match self {
            Self::UploadedImage(img) => Some(img),
            _ => None,
        }
    }

    pub fn gradient(&self) -> Option<GradientId> {
        match self {
            Self::Gradient(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Lyric,
    Code,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LyricFields {
    pub title: String,
    pub artist: String,
    pub lyrics: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodeFields {
    pub code: String,
    pub language: String,
}

impl Default for CodeFields {
    fn default() -> Self {
        Self {
            code: String::new(),
            language: DEFAULT_LANGUAGE.to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardContent {
    Lyric(LyricFields),
    Code(CodeFields),
}

impl CardContent {
    pub fn kind(&self) -> CardKind {
        match self {
            Self::Lyric(_) => CardKind::Lyric,
            Self::Code(_) => CardKind::Code,
        }
    }
}

/// The card being edited.
///
/// Fields are private so the background exclusivity and the body cap hold for every write.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CardModel {
    content: CardContent,
    #[serde(default)]
    background: BackgroundSpec,
}

impl CardModel {
    pub fn lyric() -> Self {
        Self {
            content: CardContent::Lyric(LyricFields::default()),
            background: BackgroundSpec::None,
        }
    }

    pub fn code() -> Self {
        Self {
            content: CardContent::Code(CodeFields::default()),
            background: BackgroundSpec::None,
        }
    }

    pub fn new(kind: CardKind) -> Self {
        match kind {
            CardKind::Lyric => Self::lyric(),
            CardKind::Code => Self::code(),
        }
    }

    pub fn kind(&self) -> CardKind {
        self.content.kind()
    }

    pub fn content(&self) -> &CardContent {
        &self.content
    }

    pub fn background(&self) -> &BackgroundSpec {
        &self.background
    }

    pub fn lyric_fields(&self) -> Option<&LyricFields> {
        match &self.content {
            CardContent::Lyric(f) => Some(f),
            CardContent::Code(_) => None,
        }
    }

    pub fn code_fields(&self) -> Option<&CodeFields> {
        match &self.content {
            CardContent::Code(f) => Some(f),
            CardContent::Lyric(_) => None,
        }
    }

    /// Replace the background; the previous variant is dropped entirely.
    pub fn set_background(&mut self, spec: BackgroundSpec) {
        self.background = spec;
    }

    pub fn set_uploaded_image(&mut self, image: EncodedImage) {
        self.set_background(BackgroundSpec::UploadedImage(image));
    }

    pub fn set_gradient(&mut self, id: GradientId) {
        self.set_background(BackgroundSpec::Gradient(id));
    }

    pub fn clear_background(&mut self) {
        self.set_background(BackgroundSpec::None);
    }

    /// Returns `false` when the card is not a lyric card.
    pub fn set_title(&mut self, title: impl Into<String>) -> bool {
        match &mut self.content {
            CardContent::Lyric(f) => {
                f.title = title.into();
                true
            }
            CardContent::Code(_) => false,
        }
    }

    pub fn set_artist(&mut self, artist: impl Into<String>) -> bool {
        match &mut self.content {
            CardContent::Lyric(f) => {
                f.artist = artist.into();
                true
            }
            CardContent::Code(_) => false,
        }
    }

    /// Writes over [`MAX_BODY_CHARS`] are not applied.
    pub fn set_lyrics(&mut self, lyrics: impl Into<String>) -> bool {
        let lyrics = lyrics.into();
        match &mut self.content {
            CardContent::Lyric(f) if within_body_cap(&lyrics) => {
                f.lyrics = lyrics;
                true
            }
            _ => false,
        }
    }

    /// Writes over [`MAX_BODY_CHARS`] are not applied.
    pub fn set_code(&mut self, code: impl Into<String>) -> bool {
        let code = code.into();
        match &mut self.content {
            CardContent::Code(f) if within_body_cap(&code) => {
                f.code = code;
                true
            }
            _ => false,
        }
    }

    pub fn set_language(&mut self, language: impl Into<String>) -> bool {
        match &mut self.content {
            CardContent::Code(f) => {
                f.language = language.into();
                true
            }
            CardContent::Lyric(_) => false,
        }
    }

    /// Clear every field back to a fresh card of the same kind.
    pub fn reset(&mut self) {
        *self = Self::new(self.kind());
    }

    /// Re-check the body cap on a deserialized card.
    pub fn validate(&self) -> crate::LyricodeResult<()> {
        let body = match &self.content {
            CardContent::Lyric(f) => &f.lyrics,
            CardContent::Code(f) => &f.code,
        };
        if !within_body_cap(body) {
            return Err(crate::LyricodeError::validation(format!(
                "card body exceeds {MAX_BODY_CHARS} characters"
            )));
        }
        Ok(())
    }
}

fn within_body_cap(s: &str) -> bool {
    s.chars().count() <= MAX_BODY_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> EncodedImage {
        EncodedImage::from_bytes("image/jpeg", b"\xff\xd8\xff")
    }

    #[test]
    fn gradient_clears_uploaded_image() {
        let mut card = CardModel::lyric();
        card.set_uploaded_image(image());
        assert!(card.background().uploaded_image().is_some());

        card.set_gradient(GradientId::Mesh3);
        assert_eq!(card.background(), &BackgroundSpec::Gradient(GradientId::Mesh3));
        assert!(card.background().uploaded_image().is_none());
    }

    #[test]
    fn image_clears_gradient_and_none_clears_both() {
        let mut card = CardModel::code();
        card.set_gradient(GradientId::Mesh1);
        card.set_uploaded_image(image());
        assert_eq!(card.background().gradient(), None);

        card.clear_background();
        assert_eq!(card.background(), &BackgroundSpec::None);
    }

    #[test]
    fn body_over_cap_is_not_applied() {
        let mut card = CardModel::lyric();
        assert!(card.set_lyrics("la la la"));
        assert!(!card.set_lyrics("x".repeat(MAX_BODY_CHARS + 1)));
        assert_eq!(card.lyric_fields().unwrap().lyrics, "la la la");

        assert!(card.set_lyrics("é".repeat(MAX_BODY_CHARS)));
    }

    #[test]
    fn code_cap_and_kind_mismatch() {
        let mut card = CardModel::code();
        assert_eq!(card.code_fields().unwrap().language, DEFAULT_LANGUAGE);
        assert!(!card.set_title("nope"));
        assert!(!card.set_code("y".repeat(MAX_BODY_CHARS + 1)));
        assert!(card.set_code("print(1)"));
        assert!(card.set_language("python"));
        assert_eq!(
            card.code_fields().unwrap(),
            &CodeFields {
                code: "print(1)".into(),
                language: "python".into()
            }
        );
    }

    #[test]
    fn reset_keeps_kind() {
        let mut card = CardModel::lyric();
        card.set_title("Home");
        card.set_gradient(GradientId::Mesh2);
        card.reset();
        assert_eq!(card, CardModel::lyric());
    }

    #[test]
    fn json_shape_is_tagged() {
        let mut card = CardModel::lyric();
        card.set_title("Home");
        card.set_gradient(GradientId::Mesh4);
        let v = serde_json::to_value(&card).unwrap();
        assert_eq!(v["content"]["kind"], "lyric");
        assert_eq!(v["background"]["type"], "gradient");
        assert_eq!(v["background"]["value"], "mesh4");

        let back: CardModel = serde_json::from_value(v).unwrap();
        assert_eq!(back, card);
    }

    #[test]
    fn validate_catches_oversized_json_body() {
        let json = serde_json::json!({
            "content": {"kind": "code", "code": "z".repeat(MAX_BODY_CHARS + 1), "language": "go"}
        });
        let card: CardModel = serde_json::from_value(json).unwrap();
        assert!(card.validate().is_err());
        assert_eq!(card.background(), &BackgroundSpec::None);
    }
}
