#![allow(dead_code)]

use glam::Vec2;
use image::Rgb;
use image::imageops;
use panorama_stitch::features::{Descriptor, FeatureSet};
use panorama_stitch::traits::{FeatureDetector, Warper};
use panorama_stitch::types::Image;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const DOT: u32 = 3;
const CELL: u32 = 10;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Black scene with one uniquely coloured 3x3 dot per 10x10 cell.
pub fn dot_scene(width: u32, height: u32, seed: u64) -> Image {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut img = Image::new(width, height);
    for cy in 0..height / CELL {
        for cx in 0..width / CELL {
            let x0 = cx * CELL + rng.random_range(1..=CELL - DOT - 1);
            let y0 = cy * CELL + rng.random_range(1..=CELL - DOT - 1);
            let color = Rgb([
                rng.random_range(0.2..1.0f32),
                rng.random_range(0.2..1.0f32),
                rng.random_range(0.2..1.0f32),
            ]);
            for y in y0..y0 + DOT {
                for x in x0..x0 + DOT {
                    img.put_pixel(x, y, color);
                }
            }
        }
    }
    img
}

pub fn noise_image(width: u32, height: u32, seed: u64) -> Image {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Image::from_fn(width, height, |_, _| {
        Rgb([rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>()])
    })
}

pub fn crop(img: &Image, x: u32, y: u32, width: u32, height: u32) -> Image {
    imageops::crop_imm(img, x, y, width, height).to_image()
}

/// Horizontal crops of one scene, each shifted `step` pixels right of the previous.
pub fn sliding_crops(scene: &Image, n: u32, step: u32, width: u32) -> Vec<Image> {
    (0..n)
        .map(|k| crop(scene, k * step, 0, width, scene.height()))
        .collect()
}

/// Finds complete dots; the descriptor is the dot colour, the coordinate its centre
/// relative to the image centre.
pub struct DotDetector;

impl FeatureDetector for DotDetector {
    fn detect(&self, img: &Image) -> FeatureSet {
        let (w, h) = img.dimensions();
        let mut feats = FeatureSet::new();
        if w < DOT + 2 || h < DOT + 2 {
            return feats;
        }
        for y in 1..h - DOT {
            for x in 1..w - DOT {
                let c = *img.get_pixel(x, y);
                if c.0 == [0.0; 3] {
                    continue;
                }
                let block =
                    (y..y + DOT).all(|yy| (x..x + DOT).all(|xx| *img.get_pixel(xx, yy) == c));
                let fresh = *img.get_pixel(x - 1, y) != c && *img.get_pixel(x, y - 1) != c;
                if block && fresh {
                    let cx = x as f32 + 1.0 - w as f32 / 2.0;
                    let cy = y as f32 + 1.0 - h as f32 / 2.0;
                    feats.push(Descriptor::new(Vec2::new(cx, cy), c.0.to_vec()));
                }
            }
        }
        feats
    }
}

/// Leaves images and features untouched.
pub struct NoopWarper;

impl Warper for NoopWarper {
    fn warp_image(&self, _h_factor: f64, img: &Image) -> Image {
        img.clone()
    }

    fn warp_features(&self, _h_factor: f64, _width: u32, _height: u32, _feats: &mut FeatureSet) {}
}
