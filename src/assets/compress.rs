use crate::{
    assets::{data_uri::EncodedImage, decode::decode_rgba},
    foundation::config::CompressSettings,
};

/// Result of a single compression pass.
#[derive(Clone, Debug, PartialEq)]
pub enum Compression {
    /// The re-encoded image is within budget.
    Fits(CompressedImage),
    /// Compression could not produce a usable asset; callers keep the original bytes.
    Degrade(DegradeReason),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompressedImage {
    pub image: EncodedImage,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DegradeReason {
    DecodeFailure(String),
    EncodeFailure(String),
    SizeBudgetExceeded { size_kb: f64, max_size_kb: u32 },
}

impl Compression {
    /// The fitted image, or `None` when the caller must fall back.
    pub fn into_fitted(self) -> Option<EncodedImage> {
        match self {
            Self::Fits(c) => Some(c.image),
            Self::Degrade(_) => None,
        }
    }
}

/// Single-pass, best-effort downscale + JPEG re-encode of user backgrounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssetCompressor {
    settings: CompressSettings,
}

impl AssetCompressor {
    pub fn new(settings: CompressSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> CompressSettings {
        self.settings
    }

    /// Decode, clamp the longer side, encode once and check the size budget.
    ///
    /// There is no quality search: an over-budget result degrades instead of retrying.
    pub fn compress(&self, raw: &[u8], max_size_kb: u32) -> Compression {
        let rgba = match decode_rgba(raw) {
            Ok(img) => img,
            Err(e) => {
                tracing::debug!(error = %e, "background decode failed");
                return Compression::Degrade(DegradeReason::DecodeFailure(e.to_string()));
            }
        };

        let (src_w, src_h) = rgba.dimensions();
        let (width, height) = target_dimensions(src_w, src_h, self.settings.max_dimension);
        let scaled = if (width, height) == (src_w, src_h) {
            rgba
        } else {
            image::imageops::resize(&rgba, width, height, image::imageops::FilterType::Triangle)
        };

        let jpeg = match encode_jpeg(&scaled, self.settings.quality) {
            Ok(bytes) => bytes,
            Err(msg) => return Compression::Degrade(DegradeReason::EncodeFailure(msg)),
        };
        let image = EncodedImage::from_bytes("image/jpeg", &jpeg);

        let size_kb = image.size_kb();
        if size_kb > f64::from(max_size_kb) {
            tracing::debug!(size_kb, max_size_kb, "compressed background over budget");
            return Compression::Degrade(DegradeReason::SizeBudgetExceeded {
                size_kb,
                max_size_kb,
            });
        }

        tracing::debug!(src_w, src_h, width, height, size_kb, "background compressed");
        Compression::Fits(CompressedImage {
            image,
            width,
            height,
        })
    }

    /// [`compress`](Self::compress) with the configured budget, falling back to the
    /// unmodified bytes on any degrade.
    pub fn compress_or_original(&self, raw: &[u8]) -> EncodedImage {
        match self.compress(raw, self.settings.max_size_kb) {
            Compression::Fits(c) => c.image,
            Compression::Degrade(reason) => {
                tracing::warn!(?reason, "using original background bytes");
                EncodedImage::sniff(raw)
            }
        }
    }
}

/// Aspect-preserving target size whose longer side is at most `max_side`; never upscales.
pub fn target_dimensions(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_side || longer == 0 {
        return (width, height);
    }
    let ratio = f64::from(max_side) / f64::from(longer);
    let scale = |v: u32| ((f64::from(v) * ratio).floor() as u32).max(1);
    if width >= height {
        (max_side, scale(height))
    } else {
        (scale(width), max_side)
    }
}

// JPEG has no alpha: flatten onto black like a canvas export does.
fn encode_jpeg(rgba: &image::RgbaImage, quality: u8) -> Result<Vec<u8>, String> {
    let (w, h) = rgba.dimensions();
    let mut rgb = image::RgbImage::new(w, h);
    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let a = u16::from(src[3]);
        let flat = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
        *dst = image::Rgb([flat(src[0]), flat(src[1]), flat(src[2])]);
    }

    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| format!("jpeg encode: {e}"))?;
    Ok(buf)
}
