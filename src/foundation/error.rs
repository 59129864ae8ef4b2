pub type LyricodeResult<T> = Result<T, LyricodeError>;

#[derive(thiserror::Error, Debug)]
pub enum LyricodeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LyricodeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for failures raised by a storage or record backend.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl From<serde_json::Error> for LyricodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            LyricodeError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(LyricodeError::decode("x").to_string().contains("decode error:"));
        assert!(LyricodeError::encode("x").to_string().contains("encode error:"));
        assert!(LyricodeError::render("x").to_string().contains("render error:"));
        assert!(
            LyricodeError::persistence("x")
                .to_string()
                .contains("persistence error:")
        );
        assert!(
            LyricodeError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = LyricodeError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
        assert!(!err.is_persistence());
    }

    #[test]
    fn json_errors_map_to_serde() {
        let err: LyricodeError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, LyricodeError::Serde(_)));
    }
}
