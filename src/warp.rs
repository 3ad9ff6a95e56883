use glam::Vec2;
use nalgebra as na;

use crate::blender::interpolate;
use crate::features::FeatureSet;
use crate::traits::Warper;
use crate::types::{Image, NO_COLOR};

/// Unwraps onto a cylinder of radius `h_factor * max(width, height)` whose axis passes
/// through the image centre.
#[derive(Debug, Clone, Copy, Default)]
pub struct CylinderWarper;

impl CylinderWarper {
    pub fn radius(h_factor: f64, width: u32, height: u32) -> f64 {
        h_factor * width.max(height) as f64
    }

    /// Centred image coordinate -> centred cylinder coordinate.
    pub fn forward(r: f64, p: &na::Vector2<f64>) -> na::Vector2<f64> {
        na::Vector2::new(r * (p.x / r).atan(), r * p.y / p.x.hypot(r))
    }

    /// Centred cylinder coordinate -> centred image coordinate, `None` past the horizon.
    pub fn backward(r: f64, p: &na::Vector2<f64>) -> Option<na::Vector2<f64>> {
        let theta = p.x / r;
        if theta.abs() >= std::f64::consts::FRAC_PI_2 {
            return None;
        }
        let x = r * theta.tan();
        Some(na::Vector2::new(x, p.y * x.hypot(r) / r))
    }
}

impl Warper for CylinderWarper {
    fn warp_image(&self, h_factor: f64, img: &Image) -> Image {
        let (w, h) = img.dimensions();
        let r = Self::radius(h_factor, w, h);
        let half = na::Vector2::new(w as f64 / 2.0, h as f64 / 2.0);
        Image::from_par_fn(w, h, |x, y| {
            let p = na::Vector2::new(x as f64, y as f64) - half;
            Self::backward(r, &p)
                .map(|src| src + half)
                .filter(|src| src.x >= 0.0 && src.y >= 0.0 && src.x < w as f64 && src.y < h as f64)
                .and_then(|src| interpolate(img, src.x, src.y))
                .unwrap_or(NO_COLOR)
        })
    }

    fn warp_features(&self, h_factor: f64, width: u32, height: u32, feats: &mut FeatureSet) {
        let r = Self::radius(h_factor, width, height);
        for f in feats.iter_mut() {
            let p = Self::forward(r, &na::Vector2::new(f.coor.x as f64, f.coor.y as f64));
            f.coor = Vec2::new(p.x as f32, p.y as f32);
        }
    }
}
