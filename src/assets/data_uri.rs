use base64::Engine as _;

use crate::foundation::error::{LyricodeError, LyricodeResult};

const GENERIC_MIME: &str = "application/octet-stream";

/// An image carried as a base64 `data:` URI.
///
/// This is the representation backgrounds travel in between upload, preview and remote
/// storage. The string is validated on construction; the payload is decoded lazily.
#[derive(Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncodedImage {
    uri: String,
    // byte offset of the base64 payload inside `uri`
    payload_at: usize,
}

impl EncodedImage {
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        let prefix = format!("data:{mime};base64,");
        let payload_at = prefix.len();
        let mut uri = prefix;
        base64::engine::general_purpose::STANDARD.encode_string(bytes, &mut uri);
        Self { uri, payload_at }
    }

    /// Wrap raw file bytes, sniffing the mime type from the content.
    pub fn sniff(bytes: &[u8]) -> Self {
        let mime = image::guess_format(bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or(GENERIC_MIME);
        Self::from_bytes(mime, bytes)
    }

    pub fn parse(uri: impl Into<String>) -> LyricodeResult<Self> {
        let uri = uri.into();
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| LyricodeError::validation("not a data: URI"))?;
        let (header, _) = rest
            .split_once(',')
            .ok_or_else(|| LyricodeError::validation("data: URI has no payload separator"))?;
        let is_base64 = header
            .split(';')
            .any(|seg| seg.trim().eq_ignore_ascii_case("base64"));
        if !is_base64 {
            return Err(LyricodeError::validation(
                "only base64 data: URIs are supported",
            ));
        }
        let payload_at = "data:".len() + header.len() + 1;
        Ok(Self { uri, payload_at })
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn mime(&self) -> &str {
        let header = &self.uri["data:".len()..self.payload_at - 1];
        header
            .split(';')
            .next()
            .map(str::trim)
            .filter(|m| m.contains('/'))
            .unwrap_or(GENERIC_MIME)
    }

    pub fn payload(&self) -> &str {
        &self.uri[self.payload_at..]
    }

    pub fn decode_bytes(&self) -> LyricodeResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.payload().trim())
            .map_err(|e| LyricodeError::decode(format!("invalid base64 data URI: {e}")))
    }

    /// Size estimate in KiB: character length of the whole URI over 1024.
    pub fn size_kb(&self) -> f64 {
        self.uri.len() as f64 / 1024.0
    }
}

impl TryFrom<String> for EncodedImage {
    type Error = LyricodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EncodedImage> for String {
    fn from(value: EncodedImage) -> Self {
        value.uri
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime())
            .field("len", &self.uri.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_builds_base64_uri() {
        let img = EncodedImage::from_bytes("image/png", b"hello");
        assert_eq!(img.as_str(), "data:image/png;base64,aGVsbG8=");
        assert_eq!(img.mime(), "image/png");
        assert_eq!(img.decode_bytes().unwrap(), b"hello");
    }

    #[test]
    fn parse_accepts_extra_parameters() {
        let img = EncodedImage::parse("data:image/jpeg;charset=x;base64,aGk=").unwrap();
        assert_eq!(img.mime(), "image/jpeg");
        assert_eq!(img.payload(), "aGk=");
    }

    #[test]
    fn parse_rejects_non_base64_and_plain_urls() {
        assert!(EncodedImage::parse("https://example.com/a.png").is_err());
        assert!(EncodedImage::parse("data:text/plain,hello").is_err());
        assert!(EncodedImage::parse("data:image/png;base64").is_err());
    }

    #[test]
    fn sniff_falls_back_to_generic_mime() {
        assert_eq!(EncodedImage::sniff(b"\x00\x01").mime(), GENERIC_MIME);
    }

    #[test]
    fn serde_uses_plain_string() {
        let img = EncodedImage::from_bytes("image/png", b"x");
        let json = serde_json::to_string(&img).unwrap();
        assert_eq!(json, "\"data:image/png;base64,eA==\"");
        let back: EncodedImage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, img);
        assert!(serde_json::from_str::<EncodedImage>("\"nope\"").is_err());
    }
}
