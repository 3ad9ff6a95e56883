use glam::UVec2;
use image::Rgb;

use crate::blend::SampleMap;
use crate::traits::Blender;
use crate::types::{Image, NO_COLOR, is_no_color};

/// Keeps edge pixels from ending up with zero weight.
const WEIGHT_FLOOR: f32 = 1e-4;

/// Bilinear sample at `(x, y)`; `None` when any tap is `NO_COLOR` or outside the image.
pub fn interpolate(img: &Image, x: f64, y: f64) -> Option<Rgb<f32>> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || !(x >= 0.0 && y >= 0.0) || x >= w as f64 || y >= h as f64 {
        return None;
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let taps = [
        (img.get_pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (img.get_pixel(x1, y0), fx * (1.0 - fy)),
        (img.get_pixel(x0, y1), (1.0 - fx) * fy),
        (img.get_pixel(x1, y1), fx * fy),
    ];
    let mut out = [0.0f32; 3];
    for (px, wt) in taps {
        if is_no_color(px) {
            return None;
        }
        for c in 0..3 {
            out[c] += px.0[c] * wt;
        }
    }
    Some(Rgb(out))
}

struct Layer<'a> {
    top_left: UVec2,
    samples: SampleMap,
    img: &'a Image,
}

/// Centre-weighted average of every layer covering a canvas pixel.
#[derive(Default)]
pub struct LinearBlender<'a> {
    layers: Vec<Layer<'a>>,
}

impl<'a> LinearBlender<'a> {
    pub fn new() -> LinearBlender<'a> {
        LinearBlender { layers: Vec::new() }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

impl<'a> Blender<'a> for LinearBlender<'a> {
    fn add_image(&mut self, top_left: UVec2, samples: SampleMap, img: &'a Image) {
        self.layers.push(Layer {
            top_left,
            samples,
            img,
        });
    }

    fn run(&mut self, canvas: &mut Image) {
        let layers = std::mem::take(&mut self.layers);
        let prev: &Image = canvas;
        // every worker owns one output pixel
        let blended = Image::from_par_fn(prev.width(), prev.height(), |x, y| {
            let mut acc = [0.0f32; 3];
            let mut weight = 0.0f32;
            for layer in &layers {
                let (Some(lx), Some(ly)) = (
                    x.checked_sub(layer.top_left.x),
                    y.checked_sub(layer.top_left.y),
                ) else {
                    continue;
                };
                let Some(p) = layer.samples.get(lx as usize, ly as usize) else {
                    continue;
                };
                let Some(color) = interpolate(layer.img, p.x, p.y) else {
                    continue;
                };
                let (w, h) = layer.img.dimensions();
                let wx = 0.5 - (p.x as f32 / w as f32 - 0.5).abs();
                let wy = 0.5 - (p.y as f32 / h as f32 - 0.5).abs();
                let wt = wx.max(0.0) * wy.max(0.0) + WEIGHT_FLOOR;
                for c in 0..3 {
                    acc[c] += color.0[c] * wt;
                }
                weight += wt;
            }
            if weight > 0.0 {
                Rgb([acc[0] / weight, acc[1] / weight, acc[2] / weight])
            } else {
                *prev.get_pixel(x, y)
            }
        });
        *canvas = blended;
    }
}

/// Fresh canvas with every pixel `NO_COLOR`.
pub fn empty_canvas(width: u32, height: u32) -> Image {
    Image::from_pixel(width, height, NO_COLOR)
}
