//! Alpha compositing and concatenation of frames.

use image::{imageops, Rgb, RgbImage};

use crate::error::{MediaError, MediaResult};

/// Fraction of the width used for the soft edge between the two frames
pub const DEFAULT_TRANSITION_FRACTION: f64 = 0.01;

/// Per-column opacity of `first` for a reveal of `weight` of the width.
///
/// The rightmost `round(width * weight)` columns are transparent and the
/// rest opaque. When the boundary lies inside the canvas, a band of
/// `round(width * transition_fraction)` columns centred on it fades linearly
/// from opaque to transparent, clipped at the canvas edges.
pub fn column_alpha(width: u32, weight: f64, transition_fraction: f64) -> Vec<u8> {
    let right_width = ((width as f64 * weight.clamp(0.0, 1.0)).round() as u32).min(width);
    let start_right = width - right_width;

    let mut alpha: Vec<u8> = (0..width)
        .map(|x| if x < start_right { 255 } else { 0 })
        .collect();

    // A band only exists where there is a boundary to soften.
    if transition_fraction > 0.0 && right_width > 0 && right_width < width {
        let band = (width as f64 * transition_fraction).round() as u32;
        let band_start = (start_right as f64 - band as f64 / 2.0).max(0.0) as u32;
        for i in 0..band {
            let x = band_start + i;
            if x >= width {
                break;
            }
            alpha[x as usize] = (255.0 - i as f64 / band as f64 * 255.0) as u8;
        }
    }

    alpha
}

/// Composite `second` into the right-hand `weight` of `first`.
///
/// Both frames must have the same dimensions. The result is opaque RGB with
/// `alpha * first + (1 - alpha) * second` per channel.
pub fn blend(
    first: &RgbImage,
    second: &RgbImage,
    weight: f64,
    transition_fraction: f64,
) -> MediaResult<RgbImage> {
    if first.dimensions() != second.dimensions() {
        return Err(MediaError::SizeMismatch {
            left: first.dimensions(),
            right: second.dimensions(),
        });
    }

    let (width, height) = first.dimensions();
    let alpha = column_alpha(width, weight, transition_fraction);

    let out = RgbImage::from_fn(width, height, |x, y| {
        let a = alpha[x as usize] as u32;
        let p = first.get_pixel(x, y);
        let q = second.get_pixel(x, y);
        let mix = |c: usize| ((p[c] as u32 * a + q[c] as u32 * (255 - a) + 127) / 255) as u8;
        Rgb([mix(0), mix(1), mix(2)])
    });

    Ok(out)
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Place images left to right with a gap of `round(total_width * pad_fraction)`.
///
/// The canvas is as tall as the tallest image; unset `pad_color` fills the
/// gaps black.
pub fn concat_horizontal(
    images: &[RgbImage],
    pad_fraction: f64,
    pad_color: Option<Rgb<u8>>,
) -> MediaResult<RgbImage> {
    concat(images, Axis::Horizontal, pad_fraction, pad_color.unwrap_or(Rgb([0, 0, 0])))
}

/// Place images top to bottom with a gap of `round(total_height * pad_fraction)`.
///
/// The canvas is as wide as the widest image; unset `pad_color` fills the
/// gaps white. The offset after the second image advances by the gap only,
/// so with three or more images the third overlaps the second.
pub fn concat_vertical(
    images: &[RgbImage],
    pad_fraction: f64,
    pad_color: Option<Rgb<u8>>,
) -> MediaResult<RgbImage> {
    concat(images, Axis::Vertical, pad_fraction, pad_color.unwrap_or(Rgb([255, 255, 255])))
}

fn concat(
    images: &[RgbImage],
    axis: Axis,
    pad_fraction: f64,
    fill: Rgb<u8>,
) -> MediaResult<RgbImage> {
    if images.is_empty() {
        return Err(MediaError::EmptyInput);
    }

    let extent = |im: &RgbImage| match axis {
        Axis::Horizontal => im.width(),
        Axis::Vertical => im.height(),
    };
    let cross = |im: &RgbImage| match axis {
        Axis::Horizontal => im.height(),
        Axis::Vertical => im.width(),
    };

    let total: u32 = images.iter().map(extent).sum();
    let max_cross = images.iter().map(cross).max().unwrap_or(0);
    let pad = (total as f64 * pad_fraction).round() as u32;
    let length = total + (images.len() as u32 - 1) * pad;

    let mut canvas = match axis {
        Axis::Horizontal => RgbImage::from_pixel(length, max_cross, fill),
        Axis::Vertical => RgbImage::from_pixel(max_cross, length, fill),
    };

    let mut offset: i64 = 0;
    for (index, im) in images.iter().enumerate() {
        match axis {
            Axis::Horizontal => imageops::replace(&mut canvas, im, offset, 0),
            Axis::Vertical => imageops::replace(&mut canvas, im, 0, offset),
        }
        offset += match (axis, index) {
            (Axis::Vertical, 1) => pad as i64,
            _ => (extent(im) + pad) as i64,
        };
    }

    Ok(canvas)
}
