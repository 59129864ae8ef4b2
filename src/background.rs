use std::{str::FromStr, sync::Arc};

use crate::{
    assets::{PreparedImage, decode::decode_image},
    blur_cpu::blur_image,
    card::BackgroundSpec,
    composite_cpu::layer_over,
    foundation::{
        core::Rgba8,
        error::{LyricodeError, LyricodeResult},
    },
};

/// One of the four preset palette gradients.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GradientId {
    Mesh1,
    Mesh2,
    Mesh3,
    Mesh4,
}

impl GradientId {
    pub const ALL: [GradientId; 4] = [Self::Mesh1, Self::Mesh2, Self::Mesh3, Self::Mesh4];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mesh1 => "mesh1",
            Self::Mesh2 => "mesh2",
            Self::Mesh3 => "mesh3",
            Self::Mesh4 => "mesh4",
        }
    }
}

impl FromStr for GradientId {
    type Err = LyricodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| LyricodeError::validation(format!("unknown gradient '{s}'")))
    }
}

impl std::fmt::Display for GradientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-stop gradient running left to right across the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearGradient {
    pub start: Rgba8,
    pub end: Rgba8,
}

/// The fixed gradient palette.
pub struct GradientPalette;

impl GradientPalette {
    pub const DEFAULT: LinearGradient = LinearGradient {
        start: Rgba8::opaque(0x4c, 0x51, 0xbf),
        end: Rgba8::opaque(0x80, 0x5a, 0xd5),
    };

    pub const fn get(id: GradientId) -> LinearGradient {
        match id {
            GradientId::Mesh1 => LinearGradient {
                start: Rgba8::opaque(0x6b, 0x46, 0xc1),
                end: Rgba8::opaque(0xd5, 0x3f, 0x8c),
            },
            GradientId::Mesh2 => LinearGradient {
                start: Rgba8::opaque(0x42, 0x99, 0xe1),
                end: Rgba8::opaque(0x38, 0xb2, 0xac),
            },
            GradientId::Mesh3 => LinearGradient {
                start: Rgba8::opaque(0xed, 0x89, 0x36),
                end: Rgba8::opaque(0xf5, 0x65, 0x65),
            },
            GradientId::Mesh4 => LinearGradient {
                start: Rgba8::opaque(0x48, 0xbb, 0x78),
                end: Rgba8::opaque(0x34, 0xd3, 0x99),
            },
        }
    }

    pub fn entries() -> impl Iterator<Item = (GradientId, LinearGradient)> {
        GradientId::ALL.into_iter().map(|id| (id, Self::get(id)))
    }
}

/// Which card surface a background is painted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Blurred image under the glass overlay.
    Lyric,
    /// Crisp image; the editor panel provides contrast.
    Code,
}

impl From<crate::card::CardKind> for Surface {
    fn from(kind: crate::card::CardKind) -> Self {
        match kind {
            crate::card::CardKind::Lyric => Self::Lyric,
            crate::card::CardKind::Code => Self::Code,
        }
    }
}

/// Render-ready form of a [`BackgroundSpec`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaintDescriptor {
    /// Cover-fit image. `source` is the undecorated upload, `fill` is what covers the card.
    Image {
        source: Arc<PreparedImage>,
        fill: Arc<PreparedImage>,
        blurred: bool,
    },
    Gradient {
        gradient: LinearGradient,
        /// Palette entry, `None` for the default fallback.
        id: Option<GradientId>,
    },
}

impl PaintDescriptor {
    pub fn default_gradient() -> Self {
        Self::Gradient {
            gradient: GradientPalette::DEFAULT,
            id: None,
        }
    }

    pub fn is_palette_gradient(&self) -> bool {
        matches!(self, Self::Gradient { id: Some(_), .. })
    }
}

/// Turns background specs into paint descriptors.
#[derive(Clone, Copy, Debug)]
pub struct BackgroundRenderer {
    blur_sigma: f32,
}

impl Default for BackgroundRenderer {
    fn default() -> Self {
        Self::new(20.0)
    }
}

impl BackgroundRenderer {
    pub fn new(blur_sigma: f32) -> Self {
        Self { blur_sigma }
    }

    /// Deterministic: the same spec always yields an equal descriptor.
    ///
    /// An upload that fails to decode paints the default gradient.
    pub fn render(&self, spec: &BackgroundSpec, surface: Surface) -> PaintDescriptor {
        match spec {
            BackgroundSpec::None => PaintDescriptor::default_gradient(),
            BackgroundSpec::Gradient(id) => PaintDescriptor::Gradient {
                gradient: GradientPalette::get(*id),
                id: Some(*id),
            },
            BackgroundSpec::UploadedImage(encoded) => {
                let prepared = encoded.decode_bytes().and_then(|b| decode_image(&b));
                let source = match prepared {
                    Ok(img) => Arc::new(img),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "background image unusable, painting default gradient"
                        );
                        return PaintDescriptor::default_gradient();
                    }
                };
                self.image_paint(source, surface)
            }
        }
    }

    fn image_paint(&self, source: Arc<PreparedImage>, surface: Surface) -> PaintDescriptor {
        if surface == Surface::Code {
            return PaintDescriptor::Image {
                fill: source.clone(),
                source,
                blurred: false,
            };
        }

        match self.backdrop(&source) {
            Ok(fill) => PaintDescriptor::Image {
                source,
                fill: Arc::new(fill),
                blurred: true,
            },
            Err(e) => {
                tracing::warn!(error = %e, "backdrop blur failed, painting crisp image");
                PaintDescriptor::Image {
                    fill: source.clone(),
                    source,
                    blurred: false,
                }
            }
        }
    }

    /// Offscreen at source resolution: draw the image, then draw the blurred image over it.
    ///
    /// The blurred draw is opaque wherever the source is, so it fully occludes the first draw.
    fn backdrop(&self, source: &PreparedImage) -> LyricodeResult<PreparedImage> {
        let mut offscreen = source.rgba8_premul.as_ref().clone();
        let blurred = blur_image(source, self.blur_sigma)?;
        layer_over(&mut offscreen, &blurred.rgba8_premul)?;
        Ok(PreparedImage {
            width: source.width,
            height: source.height,
            rgba8_premul: Arc::new(offscreen),
        })
    }
}
