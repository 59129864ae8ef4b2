use crate::foundation::error::{LyricodeError, LyricodeResult};

/// Premultiplied source-over of one pixel: `src + dst * (1 - src.a)`.
pub fn src_over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    match src[3] {
        255 => src,
        0 => dst,
        a => {
            let keep = 255 - u16::from(a);
            std::array::from_fn(|i| src[i].saturating_add(scale_channel(dst[i], keep)))
        }
    }
}

/// Composites `layer` over `base`; both are premultiplied RGBA8 of the same size.
pub fn layer_over(base: &mut [u8], layer: &[u8]) -> LyricodeResult<()> {
    if base.len() != layer.len() || !base.len().is_multiple_of(4) {
        return Err(LyricodeError::render(format!(
            "layer of {} bytes cannot cover base of {} bytes",
            layer.len(),
            base.len()
        )));
    }
    for (d, s) in base.chunks_exact_mut(4).zip(layer.chunks_exact(4)) {
        let out = src_over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

fn scale_channel(c: u8, by: u16) -> u8 {
    ((u32::from(c) * u32::from(by) + 127) / 255) as u8
}
