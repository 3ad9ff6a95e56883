use image::{DynamicImage, Rgb, RgbImage};

use crate::types::{Image, is_no_color};

/// 8-bit copy of a canvas; pixels nothing was drawn on become black.
pub fn to_rgb8(img: &Image) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let px = img.get_pixel(x, y);
        if is_no_color(px) {
            return Rgb([0, 0, 0]);
        }
        Rgb(px.0.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}

pub fn from_dynamic(img: &DynamicImage) -> Image {
    img.to_rgb32f()
}

/// Fraction of canvas pixels that were drawn on.
pub fn coverage(img: &Image) -> f64 {
    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let drawn = img.pixels().filter(|px| !is_no_color(px)).count();
    drawn as f64 / total as f64
}
