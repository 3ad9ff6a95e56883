use glam::UVec2;
use log::debug;
use nalgebra as na;

use crate::blend::{CanvasGeometry, SampleMap, within_bounds};
use crate::blender::empty_canvas;
use crate::bundle::{Bundle, Component};
use crate::error::{Phase, Result, StitchError};
use crate::optimization::perspective_transform;
use crate::traits::Blender;
use crate::types::{Homography, Image};

/// Canvas pixel position of a normalised corner (`[-0.5, 0.5]^2`) of `comp`.
fn corner_on_canvas(
    bundle: &Bundle,
    geometry: &CanvasGeometry,
    comp: &Component,
    corner: (f64, f64),
) -> na::Vector2<f64> {
    let p = na::Vector2::new(corner.0 * comp.width as f64, corner.1 * comp.height as f64);
    geometry.proj_to_canvas(&bundle.image_to_proj(comp, &p))
}

/// Left corners of the first component and right corners of the last, in canvas pixels,
/// ordered top-left, bottom-left, top-right, bottom-right.
pub fn extreme_corners(
    bundle: &Bundle,
    geometry: &CanvasGeometry,
) -> Option<[na::Vector2<f64>; 4]> {
    let first = bundle.components.first()?;
    let last = bundle.components.last()?;
    Some([
        corner_on_canvas(bundle, geometry, first, (-0.5, -0.5)),
        corner_on_canvas(bundle, geometry, first, (-0.5, 0.5)),
        corner_on_canvas(bundle, geometry, last, (0.5, -0.5)),
        corner_on_canvas(bundle, geometry, last, (0.5, 0.5)),
    ])
}

/// Transform taking the observed extreme corners onto the canvas rectangle.
pub fn correction_transform(bundle: &Bundle, width: u32, height: u32) -> Result<Homography> {
    let degenerate = StitchError::Degenerate {
        phase: Phase::PerspectiveCorrection,
        index: bundle.identity_idx,
    };
    let geometry = CanvasGeometry::for_bundle(bundle)?;
    let Some(corners) = extreme_corners(bundle, &geometry) else {
        return Err(degenerate);
    };
    let (w, h) = (width as f64, height as f64);
    let corners_std = [
        na::Vector2::new(0.0, 0.0),
        na::Vector2::new(0.0, h),
        na::Vector2::new(w, 0.0),
        na::Vector2::new(w, h),
    ];
    debug!("perspective corners: {:?}", corners);
    perspective_transform(&corners, &corners_std).ok_or(degenerate)
}

/// Undo the trapezoidal skew left by cylindrical unwrapping: remap the rendered canvas so the
/// outer corners of the first and last images land on the canvas corners.
pub fn perspective_correction<'a, B: Blender<'a>>(
    bundle: &Bundle,
    img: &'a Image,
    blender: &mut B,
) -> Result<Image> {
    let (w, h) = img.dimensions();
    let m = correction_transform(bundle, w, h)?;
    let inv = m.try_inverse().ok_or(StitchError::Degenerate {
        phase: Phase::PerspectiveCorrection,
        index: bundle.identity_idx,
    })?;

    let samples = SampleMap::from_fn(w as usize, h as usize, |j, i| {
        let p = inv.trans_normalize(&na::Vector3::new(j as f64, i as f64, 1.0))?;
        within_bounds(p, w, h)
    });
    blender.add_image(UVec2::ZERO, samples, img);
    let mut ret = empty_canvas(w, h);
    blender.run(&mut ret);
    Ok(ret)
}
