use glam::Vec2;
use log::trace;
use nalgebra as na;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::features::{FeatureSet, MatchData};
use crate::traits::TransformEstimator;
use crate::types::{Homography, MatchInfo};

/// Similarity that moves the centroid to the origin and the mean distance to sqrt(2).
fn normalization_transform(pts: &[na::Vector2<f64>]) -> Option<na::Matrix3<f64>> {
    let n = pts.len() as f64;
    let centroid = pts.iter().fold(na::Vector2::zeros(), |acc, p| acc + p) / n;
    let mean_dist = pts.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;
    if mean_dist <= f64::EPSILON {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(na::Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    ))
}

/// Estimate H such that `dst ~ H src` with the normalised DLT.
///
/// Needs at least four correspondences in general position.
pub fn dlt_homography(src: &[na::Vector2<f64>], dst: &[na::Vector2<f64>]) -> Option<Homography> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }
    let t_src = normalization_transform(src)?;
    let t_dst = normalization_transform(dst)?;

    // pad to 9 rows so the null vector shows up in v_t for n = 4
    let rows = (2 * n).max(9);
    let mut a = na::DMatrix::<f64>::zeros(rows, 9);
    for (i, (ps, pd)) in src.iter().zip(dst).enumerate() {
        let s = t_src * na::Vector3::new(ps.x, ps.y, 1.0);
        let d = t_dst * na::Vector3::new(pd.x, pd.y, 1.0);
        let (x, y) = (s.x / s.z, s.y / s.z);
        let (u, v) = (d.x / d.z, d.y / d.z);

        let r0 = 2 * i;
        let r1 = 2 * i + 1;
        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.total_cmp(y.1))?;
    let h = v_t.row(min_idx);

    let mut h_norm = na::Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_norm[(r, c)] = h[3 * r + c];
        }
    }
    let mut h_mat = t_dst.try_inverse()? * h_norm * t_src;
    let scale = h_mat[(2, 2)];
    if scale.abs() > f64::EPSILON {
        h_mat /= scale;
    }
    if h_mat.iter().all(|v| v.is_finite()) {
        Some(Homography(h_mat))
    } else {
        None
    }
}

/// Exact projective transform taking the four `src` points onto the four `dst` points.
pub fn perspective_transform(
    src: &[na::Vector2<f64>; 4],
    dst: &[na::Vector2<f64>; 4],
) -> Option<Homography> {
    let mut a = na::SMatrix::<f64, 8, 8>::zeros();
    let mut b = na::SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let (x, y) = (src[i].x, src[i].y);
        let (u, v) = (dst[i].x, dst[i].y);
        a[(i, 0)] = x;
        a[(i, 1)] = y;
        a[(i, 2)] = 1.0;
        a[(i, 6)] = -x * u;
        a[(i, 7)] = -y * u;
        b[i] = u;

        a[(i + 4, 3)] = x;
        a[(i + 4, 4)] = y;
        a[(i + 4, 5)] = 1.0;
        a[(i + 4, 6)] = -x * v;
        a[(i + 4, 7)] = -y * v;
        b[i + 4] = v;
    }
    let h = a.lu().solve(&b)?;
    let m = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
    if m.iter().all(|v| v.is_finite()) {
        Some(Homography(m))
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub iterations: usize,
    /// Reprojection distance in pixels under which a correspondence is an inlier.
    pub inlier_threshold: f64,
    pub min_inliers: usize,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            inlier_threshold: 3.0,
            min_inliers: 6,
            seed: 0,
        }
    }
}

/// Four-point RANSAC over the candidate correspondences, refit on the inliers.
#[derive(Debug, Clone, Default)]
pub struct RansacEstimator {
    pub config: RansacConfig,
}

impl RansacEstimator {
    pub fn new(config: RansacConfig) -> RansacEstimator {
        RansacEstimator { config }
    }

    fn inliers(
        &self,
        h: &Homography,
        pairs: &[(na::Vector2<f64>, na::Vector2<f64>)],
    ) -> Vec<usize> {
        let thr2 = self.config.inlier_threshold * self.config.inlier_threshold;
        pairs
            .iter()
            .enumerate()
            .filter_map(|(idx, (a, b))| {
                let p = h.trans2d(b);
                let d2 = (p - a).norm_squared();
                if d2.is_finite() && d2 < thr2 {
                    Some(idx)
                } else {
                    None
                }
            })
            .collect()
    }
}

fn to_na(v: Vec2) -> na::Vector2<f64> {
    na::Vector2::new(v.x as f64, v.y as f64)
}

impl TransformEstimator for RansacEstimator {
    fn fit(
        &self,
        matches: &MatchData,
        feat_a: &FeatureSet,
        feat_b: &FeatureSet,
    ) -> Option<MatchInfo> {
        let kept: Vec<(usize, usize)> = matches
            .data
            .iter()
            .copied()
            .filter(|&(ia, ib)| ia < feat_a.len() && ib < feat_b.len())
            .collect();
        let pairs: Vec<_> = kept
            .iter()
            .map(|&(ia, ib)| (to_na(feat_a[ia].coor), to_na(feat_b[ib].coor)))
            .collect();
        if pairs.len() < 4 || pairs.len() < self.config.min_inliers {
            trace!("only {} correspondences", pairs.len());
            return None;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut nums: Vec<usize> = (0..pairs.len()).collect();
        let mut best_inliers: Vec<usize> = Vec::new();
        for _ in 0..self.config.iterations {
            nums.shuffle(&mut rng);
            let (src, dst): (Vec<_>, Vec<_>) =
                nums[..4].iter().map(|&i| (pairs[i].1, pairs[i].0)).unzip();
            let Some(h) = dlt_homography(&src, &dst) else {
                continue;
            };
            let inliers = self.inliers(&h, &pairs);
            if inliers.len() > best_inliers.len() {
                best_inliers = inliers;
                if best_inliers.len() == pairs.len() {
                    break;
                }
            }
        }
        if best_inliers.len() < self.config.min_inliers.max(4) {
            trace!("ransac found {} inliers, need {}", best_inliers.len(), self.config.min_inliers);
            return None;
        }

        let (src, dst): (Vec<_>, Vec<_>) = best_inliers
            .iter()
            .map(|&i| (pairs[i].1, pairs[i].0))
            .unzip();
        let homo = dlt_homography(&src, &dst)?;
        let inliers = self.inliers(&homo, &pairs);
        if inliers.len() < self.config.min_inliers.max(4) {
            return None;
        }
        let confidence = inliers.len() as f64 / (8.0 + 0.3 * pairs.len() as f64);
        Some(MatchInfo::new(
            homo,
            inliers.iter().map(|&i| kept[i]).collect(),
            confidence,
        ))
    }
}
