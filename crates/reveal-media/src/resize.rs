//! Aspect-ratio correction of output frames.

use image::{imageops, imageops::FilterType, RgbImage};

/// Stretch a frame to the requested aspect ratio.
///
/// A ratio above 1 widens the frame to `int(width * ratio)`, a ratio below 1
/// heightens it to `int(height / ratio)`, and exactly 1 leaves it untouched.
/// Comparison videos from different runs only line up when every run applies
/// this same rule.
pub fn resize_for_aspect(frame: RgbImage, aspect_ratio: f64) -> RgbImage {
    let (width, height) = frame.dimensions();

    if aspect_ratio > 1.0 {
        let new_width = (width as f64 * aspect_ratio) as u32;
        imageops::resize(&frame, new_width, height, FilterType::CatmullRom)
    } else if aspect_ratio < 1.0 && aspect_ratio > 0.0 {
        let new_height = (height as f64 / aspect_ratio) as u32;
        imageops::resize(&frame, width, new_height, FilterType::CatmullRom)
    } else {
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_unit_ratio_is_noop() {
        let frame = RgbImage::from_pixel(8, 6, Rgb([1, 2, 3]));
        assert_eq!(resize_for_aspect(frame.clone(), 1.0), frame);
    }

    #[test]
    fn test_wide_ratio_grows_width() {
        let frame = RgbImage::new(100, 50);
        assert_eq!(resize_for_aspect(frame, 1.5).dimensions(), (150, 50));
    }

    #[test]
    fn test_tall_ratio_grows_height() {
        let frame = RgbImage::new(100, 50);
        assert_eq!(resize_for_aspect(frame, 0.5).dimensions(), (100, 100));
    }
}
