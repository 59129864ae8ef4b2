use std::sync::Arc;

use crate::{
    assets::PreparedImage,
    foundation::error::{LyricodeError, LyricodeResult},
};

/// Gaussian blur of a prepared image, CSS `blur(sigma px)` semantics.
///
/// Edges clamp, so an opaque source stays opaque.
pub fn blur_image(src: &PreparedImage, sigma: f32) -> LyricodeResult<PreparedImage> {
    let radius = radius_for_sigma(sigma);
    let data = blur_rgba8_premul(&src.rgba8_premul, src.width, src.height, radius, sigma)?;
    Ok(PreparedImage {
        width: src.width,
        height: src.height,
        rgba8_premul: Arc::new(data),
    })
}

/// Kernel half-width covering three standard deviations.
pub fn radius_for_sigma(sigma: f32) -> u32 {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0;
    }
    (sigma * 3.0).ceil() as u32
}

pub fn blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> LyricodeResult<Vec<u8>> {
    let expected_len = PreparedImage::byte_len(width, height)
        .ok_or_else(|| LyricodeError::render("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(LyricodeError::render(
            "blur_rgba8_premul expects src matching width*height*4",
        ));
    }
    if radius == 0 || width == 0 || height == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    convolve(src, &mut tmp, width as usize, height as usize, &kernel, Axis::X);
    convolve(&tmp, &mut out, width as usize, height as usize, &kernel, Axis::Y);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> LyricodeResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(LyricodeError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(LyricodeError::render("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|&wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();

    // Push the rounding residue into the center tap so the kernel sums to exactly 1.0.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

fn convolve(src: &[u8], dst: &mut [u8], w: usize, h: usize, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as isize;
    let (len, stride) = match axis {
        Axis::X => (w as isize, 4usize),
        Axis::Y => (h as isize, w * 4),
    };

    for (y, row) in dst.chunks_exact_mut(w * 4).enumerate() {
        for (x, out_px) in row.chunks_exact_mut(4).enumerate() {
            let (pos, base) = match axis {
                Axis::X => (x as isize, y * w * 4),
                Axis::Y => (y as isize, x * 4),
            };
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let s = (pos + ki as isize - radius).clamp(0, len - 1) as usize;
                let idx = base + s * stride;
                for (a, &c) in acc.iter_mut().zip(&src[idx..idx + 4]) {
                    *a += u64::from(kw) * u64::from(c);
                }
            }
            for (o, a) in out_px.iter_mut().zip(acc) {
                *o = q16_to_u8(a);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_radius_0_is_identity() {
        let src = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let out = blur_rgba8_premul(&src, 1, 2, 0, 1.0).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn blur_constant_image_is_identity() {
        let (w, h) = (4u32, 3u32);
        let px = [10u8, 20u8, 30u8, 40u8];
        let src = px.repeat((w * h) as usize);
        let out = blur_rgba8_premul(&src, w, h, 3, 2.0).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn blur_spreads_energy_from_single_pixel() {
        let (w, h) = (5u32, 5u32);
        let mut src = vec![0u8; (w * h * 4) as usize];
        let center = ((2 * w + 2) * 4) as usize;
        src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

        let out = blur_rgba8_premul(&src, w, h, 2, 1.2).unwrap();

        let nonzero = out.chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(nonzero > 1);

        let sum_a: u32 = out.chunks_exact(4).map(|px| u32::from(px[3])).sum();
        assert!((sum_a as i32 - 255).abs() <= 4);
    }

    #[test]
    fn blur_rejects_mismatched_buffer() {
        assert!(blur_rgba8_premul(&[0u8; 7], 1, 2, 1, 1.0).is_err());
    }

    #[test]
    fn radius_covers_three_sigma() {
        assert_eq!(radius_for_sigma(20.0), 60);
        assert_eq!(radius_for_sigma(0.0), 0);
        assert_eq!(radius_for_sigma(f32::NAN), 0);
    }
}
