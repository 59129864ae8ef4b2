use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{LyricodeError, LyricodeResult};

/// Runtime knobs for the card pipeline.
///
/// Layered as defaults, then an optional JSON file, then `LYRICODE_*` environment variables.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compress: CompressSettings,
    pub export: ExportSettings,
    /// Gaussian sigma (px) of the lyric backdrop blur.
    pub blur_sigma: f32,
    /// TTF/OTF used for proportional card text.
    pub sans_font: Option<PathBuf>,
    /// TTF/OTF used for the code editor body; falls back to `sans_font`.
    pub mono_font: Option<PathBuf>,
    /// Root of the local object/record store used by the CLI.
    pub data_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompressSettings {
    pub max_size_kb: u32,
    /// Longest side after downscaling.
    pub max_dimension: u32,
    /// JPEG quality on a 1..=100 scale.
    pub quality: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Supersampling factor applied at capture time.
    pub scale: u32,
    /// Logical side length of the square card surface.
    pub card_size: u32,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            max_size_kb: 50,
            max_dimension: 600,
            quality: 50,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            scale: 2,
            card_size: 600,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compress: CompressSettings::default(),
            export: ExportSettings::default(),
            blur_sigma: 20.0,
            sans_font: None,
            mono_font: None,
            data_dir: PathBuf::from(".lyricode"),
        }
    }
}

impl Settings {
    /// Defaults overlaid with an optional JSON file and the process environment.
    pub fn load(config_path: Option<&Path>) -> LyricodeResult<Self> {
        let mut settings = match config_path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: &Path) -> LyricodeResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read settings '{}'", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply `LYRICODE_*` overrides; unparsable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
            v.and_then(|s| s.trim().parse::<T>().ok())
        }

        if let Some(v) = parsed(lookup("LYRICODE_MAX_SIZE_KB")).filter(|&n: &u32| n > 0) {
            self.compress.max_size_kb = v;
        }
        if let Some(v) = parsed(lookup("LYRICODE_MAX_DIMENSION")).filter(|&n: &u32| n > 0) {
            self.compress.max_dimension = v;
        }
        if let Some(v) = parsed(lookup("LYRICODE_JPEG_QUALITY")) {
            self.compress.quality = v;
        }
        if let Some(v) = parsed(lookup("LYRICODE_EXPORT_SCALE")).filter(|&n: &u32| n > 0) {
            self.export.scale = v;
        }
        if let Some(v) = parsed(lookup("LYRICODE_BLUR_SIGMA")) {
            self.blur_sigma = v;
        }
        if let Some(v) = lookup("LYRICODE_SANS_FONT").filter(|s| !s.is_empty()) {
            self.sans_font = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LYRICODE_MONO_FONT").filter(|s| !s.is_empty()) {
            self.mono_font = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LYRICODE_DATA_DIR").filter(|s| !s.is_empty()) {
            self.data_dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> LyricodeResult<()> {
        if self.compress.max_dimension == 0 {
            return Err(LyricodeError::validation("max_dimension must be > 0"));
        }
        if !(1..=100).contains(&self.compress.quality) {
            return Err(LyricodeError::validation("jpeg quality must be in 1..=100"));
        }
        if self.export.scale == 0 || self.export.card_size == 0 {
            return Err(LyricodeError::validation(
                "export scale and card_size must be > 0",
            ));
        }
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(LyricodeError::validation("blur_sigma must be finite and >= 0"));
        }
        Ok(())
    }
}
