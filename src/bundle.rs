use log::debug;
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{Phase, Result, StitchError};
use crate::types::{Homography, Range2D};

/// Samples per image edge when tracing a component's outline into projected space.
const BORDER_SAMPLES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMethod {
    Flat,
    Cylindrical,
}

impl ProjectionMethod {
    pub fn homo2proj(&self, v: &na::Vector3<f64>) -> na::Vector2<f64> {
        match self {
            ProjectionMethod::Flat => na::Vector2::new(v.x / v.z, v.y / v.z),
            ProjectionMethod::Cylindrical => {
                na::Vector2::new(v.x.atan2(v.z), v.y / v.x.hypot(v.z))
            }
        }
    }

    /// Inverse of [`homo2proj`](Self::homo2proj) up to scale.
    pub fn proj2homo(&self, p: &na::Vector2<f64>) -> na::Vector3<f64> {
        match self {
            ProjectionMethod::Flat => na::Vector3::new(p.x, p.y, 1.0),
            ProjectionMethod::Cylindrical => na::Vector3::new(p.x.sin(), p.y, p.x.cos()),
        }
    }
}

/// One placed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub image_idx: usize,
    pub width: u32,
    pub height: u32,
    /// This image -> reference frame.
    pub homo: Homography,
    pub homo_inv: Homography,
    /// Extent in projected space, set by [`Bundle::update_proj_range`].
    pub range: Range2D,
}

impl Component {
    pub fn new(image_idx: usize, width: u32, height: u32) -> Component {
        Component {
            image_idx,
            width,
            height,
            homo: Homography::identity(),
            homo_inv: Homography::identity(),
            range: Range2D::empty(),
        }
    }

    pub fn half_size(&self) -> na::Vector2<f64> {
        na::Vector2::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

/// Every placed image in one shared reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub components: Vec<Component>,
    /// Image index whose homography is the identity.
    pub identity_idx: usize,
    pub proj_method: ProjectionMethod,
    pub proj_range: Range2D,
    /// Cylinder factor the images were warped with, if any.
    pub h_factor: Option<f64>,
}

impl Bundle {
    pub fn new(components: Vec<Component>, identity_idx: usize) -> Bundle {
        Bundle {
            components,
            identity_idx,
            proj_method: ProjectionMethod::Flat,
            proj_range: Range2D::empty(),
            h_factor: None,
        }
    }

    /// A bundle over images of the given sizes, every homography the identity.
    pub fn from_sizes(sizes: &[(u32, u32)], identity_idx: usize) -> Bundle {
        let components = sizes
            .iter()
            .enumerate()
            .map(|(idx, &(w, h))| Component::new(idx, w, h))
            .collect();
        Bundle::new(components, identity_idx)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component(&self, image_idx: usize) -> Option<&Component> {
        self.components.iter().find(|c| c.image_idx == image_idx)
    }

    pub fn identity(&self) -> Option<&Component> {
        self.component(self.identity_idx)
    }

    /// Reference image width and height.
    pub fn ref_size(&self) -> na::Vector2<f64> {
        self.identity()
            .map(|c| na::Vector2::new(c.width as f64, c.height as f64))
            .unwrap_or_else(|| na::Vector2::new(1.0, 1.0))
    }

    pub fn calc_inverse_homo(&mut self) -> Result<()> {
        for comp in self.components.iter_mut() {
            comp.homo_inv = comp.homo.try_inverse().ok_or(StitchError::Degenerate {
                phase: Phase::InverseHomography,
                index: comp.image_idx,
            })?;
        }
        Ok(())
    }

    /// Centred pixel coordinate of `comp` -> projected coordinate.
    pub fn image_to_proj(&self, comp: &Component, p: &na::Vector2<f64>) -> na::Vector2<f64> {
        let refsize = self.ref_size();
        let mut homo = comp.homo.trans(p);
        homo.x /= refsize.x;
        homo.y /= refsize.y;
        let t = self.proj_method.homo2proj(&homo);
        na::Vector2::new(t.x * refsize.x, t.y * refsize.y)
    }

    /// Projected coordinate -> homogeneous coordinate in the reference frame.
    pub fn proj_to_homo(&self, p: &na::Vector2<f64>) -> na::Vector3<f64> {
        let refsize = self.ref_size();
        let mut homo = self
            .proj_method
            .proj2homo(&na::Vector2::new(p.x / refsize.x, p.y / refsize.y));
        homo.x *= refsize.x;
        homo.y *= refsize.y;
        homo
    }

    /// Projected size of one reference pixel, measured between the reference image's
    /// opposite corners.
    pub fn proj_per_pixel(&self) -> na::Vector2<f64> {
        let lo = self
            .proj_method
            .homo2proj(&na::Vector3::new(-0.5, -0.5, 1.0));
        let hi = self.proj_method.homo2proj(&na::Vector3::new(0.5, 0.5, 1.0));
        hi - lo
    }

    /// Trace each component's border into projected space; the union becomes `proj_range`.
    pub fn update_proj_range(&mut self) {
        let border: Vec<na::Vector2<f64>> = (0..=BORDER_SAMPLES)
            .flat_map(|k| {
                let t = k as f64 / BORDER_SAMPLES as f64 - 0.5;
                [
                    na::Vector2::new(t, -0.5),
                    na::Vector2::new(t, 0.5),
                    na::Vector2::new(-0.5, t),
                    na::Vector2::new(0.5, t),
                ]
            })
            .collect();

        let mut proj_range = Range2D::empty();
        let ranges: Vec<Range2D> = self
            .components
            .iter()
            .map(|comp| {
                let mut range = Range2D::empty();
                for v in &border {
                    let p = na::Vector2::new(v.x * comp.width as f64, v.y * comp.height as f64);
                    let t = self.image_to_proj(comp, &p);
                    if t.x.is_finite() && t.y.is_finite() {
                        range.update(&t);
                    }
                }
                range
            })
            .collect();
        for (comp, range) in self.components.iter_mut().zip(ranges) {
            debug!(
                "image {} range: ({:.1}, {:.1}) - ({:.1}, {:.1})",
                comp.image_idx, range.min.x, range.min.y, range.max.x, range.max.y
            );
            if !range.is_empty() {
                proj_range = proj_range.union(&range);
            }
            comp.range = range;
        }
        self.proj_range = proj_range;
    }
}
