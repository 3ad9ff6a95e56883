use image::Rgb;
use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Pipeline image: RGB, one f32 per channel in `[0, 1]`.
pub type Image = image::Rgb32FImage;

/// Marks a pixel that no layer wrote to.
pub const NO_COLOR: Rgb<f32> = Rgb([-1.0, -1.0, -1.0]);

pub fn is_no_color(px: &Rgb<f32>) -> bool {
    px.0[0] < 0.0
}

const HOMO_EPS: f64 = 1e-12;

/// 3x3 projective transform between image planes (centred pixel coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography(pub na::Matrix3<f64>);

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn new(mat: na::Matrix3<f64>) -> Homography {
        Homography(mat)
    }

    pub fn identity() -> Homography {
        Homography(na::Matrix3::identity())
    }

    pub fn translation(tx: f64, ty: f64) -> Homography {
        Homography(na::Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0))
    }

    pub fn matrix(&self) -> &na::Matrix3<f64> {
        &self.0
    }

    /// `self * rhs`: apply `rhs` first, then `self`.
    pub fn prod(&self, rhs: &Homography) -> Homography {
        Homography(self.0 * rhs.0)
    }

    pub fn try_inverse(&self) -> Option<Homography> {
        let inv = self.0.try_inverse()?;
        if inv.iter().all(|v| v.is_finite()) {
            Some(Homography(inv))
        } else {
            None
        }
    }

    /// Homogeneous image of a 2D point.
    pub fn trans(&self, p: &na::Vector2<f64>) -> na::Vector3<f64> {
        self.0 * na::Vector3::new(p.x, p.y, 1.0)
    }

    pub fn trans_homo(&self, v: &na::Vector3<f64>) -> na::Vector3<f64> {
        self.0 * v
    }

    /// Cartesian image of a 2D point. Points sent to infinity come back non-finite.
    pub fn trans2d(&self, p: &na::Vector2<f64>) -> na::Vector2<f64> {
        let v = self.trans(p);
        na::Vector2::new(v.x / v.z, v.y / v.z)
    }

    /// Apply to a homogeneous vector and divide by the last coordinate.
    pub fn trans_normalize(&self, v: &na::Vector3<f64>) -> Option<na::Vector2<f64>> {
        let r = self.0 * v;
        if !r.z.is_finite() || r.z.abs() <= HOMO_EPS {
            return None;
        }
        let p = na::Vector2::new(r.x / r.z, r.y / r.z);
        if p.x.is_finite() && p.y.is_finite() {
            Some(p)
        } else {
            None
        }
    }

    pub fn is_identity(&self, eps: f64) -> bool {
        (self.0 - na::Matrix3::identity()).abs().max() <= eps
    }
}

/// Axis-aligned box in projected space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range2D {
    pub min: na::Vector2<f64>,
    pub max: na::Vector2<f64>,
}

impl Default for Range2D {
    fn default() -> Self {
        Self::empty()
    }
}

impl Range2D {
    pub fn new(min: na::Vector2<f64>, max: na::Vector2<f64>) -> Range2D {
        Range2D { min, max }
    }

    /// Inverted box that any `update` overwrites.
    pub fn empty() -> Range2D {
        Range2D {
            min: na::Vector2::repeat(f64::MAX),
            max: na::Vector2::repeat(f64::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn update(&mut self, p: &na::Vector2<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn union(&self, other: &Range2D) -> Range2D {
        Range2D {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn size(&self) -> na::Vector2<f64> {
        self.max - self.min
    }
}

/// Result of fitting image `j` onto image `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    /// Maps image `j` coordinates into image `i`.
    pub homo: Homography,
    /// Accepted correspondences as `(index in i, index in j)`.
    pub inliers: Vec<(usize, usize)>,
    pub confidence: f64,
}

impl MatchInfo {
    pub fn new(homo: Homography, inliers: Vec<(usize, usize)>, confidence: f64) -> MatchInfo {
        MatchInfo {
            homo,
            inliers,
            confidence,
        }
    }

    pub fn num_inliers(&self) -> usize {
        self.inliers.len()
    }

    /// The `(j, i)` record: exact matrix inverse, swapped inlier pairs.
    pub fn reversed(&self) -> Option<MatchInfo> {
        Some(MatchInfo {
            homo: self.homo.try_inverse()?,
            inliers: self.inliers.iter().map(|&(a, b)| (b, a)).collect(),
            confidence: self.confidence,
        })
    }
}
