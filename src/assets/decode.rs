use std::sync::Arc;

use crate::{
    assets::PreparedImage,
    foundation::error::{LyricodeError, LyricodeResult},
};

/// Decode any sniffable raster format into straight RGBA8.
pub fn decode_rgba(bytes: &[u8]) -> LyricodeResult<image::RgbaImage> {
    if bytes.is_empty() {
        return Err(LyricodeError::decode("image buffer is empty"));
    }
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| LyricodeError::decode(format!("decode image from memory: {e}")))?;
    Ok(dyn_img.to_rgba8())
}

pub fn decode_image(bytes: &[u8]) -> LyricodeResult<PreparedImage> {
    Ok(prepare_rgba(decode_rgba(bytes)?))
}

/// Premultiply a straight RGBA8 image for painting.
pub fn prepare_rgba(rgba: image::RgbaImage) -> PreparedImage {
    let (width, height) = rgba.dimensions();
    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
}
