use std::time::Instant;

use glam::UVec2;
use log::{debug, info};
use nalgebra as na;
use rayon::prelude::*;

use crate::blender::empty_canvas;
use crate::bundle::{Bundle, Component};
use crate::error::{Phase, Result, StitchError};
use crate::traits::Blender;
use crate::types::{Image, Range2D};

/// Per destination pixel: where to sample in the source image, `None` if undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMap {
    width: usize,
    height: usize,
    samples: Vec<Option<na::Vector2<f64>>>,
}

impl SampleMap {
    pub fn from_fn<F>(width: usize, height: usize, f: F) -> SampleMap
    where
        F: Fn(usize, usize) -> Option<na::Vector2<f64>> + Send + Sync,
    {
        let samples = (0..width * height)
            .into_par_iter()
            .map(|idx| f(idx % width, idx / width))
            .collect();
        SampleMap {
            width,
            height,
            samples,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sample position for destination `(x, y)`; `None` when undefined or outside the map.
    pub fn get(&self, x: usize, y: usize) -> Option<na::Vector2<f64>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples[y * self.width + x]
    }

    pub fn num_defined(&self) -> usize {
        self.samples.iter().filter(|s| s.is_some()).count()
    }
}

/// Keep `p` only if it lies in `[0, width) x [0, height)`.
pub fn within_bounds(p: na::Vector2<f64>, width: u32, height: u32) -> Option<na::Vector2<f64>> {
    if p.x >= 0.0 && p.y >= 0.0 && p.x < width as f64 && p.y < height as f64 {
        Some(p)
    } else {
        None
    }
}

/// Maps between projected space and canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasGeometry {
    pub proj_min: na::Vector2<f64>,
    /// Projected units per canvas pixel.
    pub per_pixel: na::Vector2<f64>,
    pub width: u32,
    pub height: u32,
}

impl CanvasGeometry {
    /// `per_pixel` is the projected size of one reference pixel; the canvas covers
    /// `proj_range` at that density.
    pub fn new(proj_range: &Range2D, per_pixel: na::Vector2<f64>) -> Result<CanvasGeometry> {
        let target = proj_range.size().component_div(&per_pixel);
        if proj_range.is_empty()
            || !target.x.is_finite()
            || !target.y.is_finite()
            || target.x < 0.0
            || target.y < 0.0
        {
            return Err(StitchError::Degenerate {
                phase: Phase::CanvasRendering,
                index: 0,
            });
        }
        Ok(CanvasGeometry {
            proj_min: proj_range.min,
            per_pixel,
            width: target.x as u32,
            height: target.y as u32,
        })
    }

    pub fn for_bundle(bundle: &Bundle) -> Result<CanvasGeometry> {
        Self::new(&bundle.proj_range, bundle.proj_per_pixel())
    }

    pub fn num_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Projected coordinate -> canvas pixel coordinate.
    pub fn proj_to_canvas(&self, p: &na::Vector2<f64>) -> na::Vector2<f64> {
        (p - self.proj_min).component_div(&self.per_pixel)
    }

    pub fn canvas_to_proj(&self, p: &na::Vector2<f64>) -> na::Vector2<f64> {
        p.component_mul(&self.per_pixel) + self.proj_min
    }

    /// Integer placement rectangle `(top_left, size)` of a projected range.
    pub fn placement(&self, range: &Range2D) -> (UVec2, UVec2) {
        let tl = self.proj_to_canvas(&range.min);
        let br = self.proj_to_canvas(&range.max);
        let top_left = UVec2::new(tl.x.max(0.0) as u32, tl.y.max(0.0) as u32);
        let bottom_right = UVec2::new(br.x.max(0.0) as u32, br.y.max(0.0) as u32);
        (top_left, bottom_right.saturating_sub(top_left))
    }
}

/// Inverse sample map of one component over its placement rectangle.
///
/// canvas pixel -> projected -> homogeneous reference coordinate -> inverse homography ->
/// source pixel, recentred on the source image.
pub fn component_sample_map(
    bundle: &Bundle,
    geometry: &CanvasGeometry,
    comp: &Component,
    top_left: UVec2,
    size: UVec2,
) -> SampleMap {
    let half = comp.half_size();
    SampleMap::from_fn(size.x as usize, size.y as usize, |j, i| {
        let c = geometry.canvas_to_proj(&na::Vector2::new(
            (j as u32 + top_left.x) as f64,
            (i as u32 + top_left.y) as f64,
        ));
        let homo = bundle.proj_to_homo(&c);
        let p = comp.homo_inv.trans_normalize(&homo)? + half;
        within_bounds(p, comp.width, comp.height)
    })
}

/// Render every component of `bundle` onto a fresh canvas through `blender`.
pub fn render<'a, B: Blender<'a>>(
    bundle: &Bundle,
    imgs: &'a [Image],
    blender: &mut B,
    max_canvas_pixels: u64,
) -> Result<Image> {
    let now = Instant::now();
    let geometry = CanvasGeometry::for_bundle(bundle)?;
    if geometry.num_pixels() > max_canvas_pixels {
        return Err(StitchError::CanvasTooLarge {
            width: geometry.width as u64,
            height: geometry.height as u64,
        });
    }
    info!("Final Image Size: {}x{}", geometry.width, geometry.height);

    let mut canvas = empty_canvas(geometry.width, geometry.height);
    for comp in &bundle.components {
        if comp.range.is_empty() {
            continue;
        }
        let Some(img) = imgs.get(comp.image_idx) else {
            return Err(StitchError::Degenerate {
                phase: Phase::CanvasRendering,
                index: comp.image_idx,
            });
        };
        let (top_left, size) = geometry.placement(&comp.range);
        let samples = component_sample_map(bundle, &geometry, comp, top_left, size);
        debug!(
            "image {} at ({}, {}) size {}x{}, {} defined samples",
            comp.image_idx,
            top_left.x,
            top_left.y,
            size.x,
            size.y,
            samples.num_defined()
        );
        blender.add_image(top_left, samples, img);
    }
    blender.run(&mut canvas);
    info!("blend: {:.3} sec", now.elapsed().as_secs_f64());
    Ok(canvas)
}
