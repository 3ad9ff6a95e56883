use glam::Vec2;
use rayon::prelude::*;

use crate::traits::FeatureMatcher;

/// One keypoint: centred pixel coordinate plus its descriptor vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub coor: Vec2,
    pub descriptor: Vec<f32>,
}

impl Descriptor {
    pub fn new(coor: Vec2, descriptor: Vec<f32>) -> Descriptor {
        Descriptor { coor, descriptor }
    }

    pub fn distance_sq(&self, other: &Descriptor) -> f32 {
        self.descriptor
            .iter()
            .zip(&other.descriptor)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Ordered keypoints of one image.
pub type FeatureSet = Vec<Descriptor>;

/// Candidate correspondences between two feature sets, as `(index in A, index in B)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchData {
    pub data: Vec<(usize, usize)>,
}

impl MatchData {
    pub fn new(data: Vec<(usize, usize)>) -> MatchData {
        MatchData { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Swap the roles of A and B.
    pub fn reverse(&mut self) {
        for pair in self.data.iter_mut() {
            *pair = (pair.1, pair.0);
        }
    }

    pub fn reversed(&self) -> MatchData {
        let mut m = self.clone();
        m.reverse();
        m
    }

    /// Coordinate pairs `(a, b)` for every correspondence, skipping stale indices.
    pub fn point_pairs(&self, feat_a: &[Descriptor], feat_b: &[Descriptor]) -> Vec<(Vec2, Vec2)> {
        self.data
            .iter()
            .filter_map(|&(ia, ib)| Some((feat_a.get(ia)?.coor, feat_b.get(ib)?.coor)))
            .collect()
    }
}

/// Nearest neighbour in descriptor space, kept when it beats the runner-up by Lowe's ratio.
#[derive(Debug, Clone)]
pub struct BruteForceMatcher {
    pub ratio: f32,
}

impl Default for BruteForceMatcher {
    fn default() -> Self {
        Self { ratio: 0.8 }
    }
}

impl FeatureMatcher for BruteForceMatcher {
    fn match_features(&self, feat_a: &FeatureSet, feat_b: &FeatureSet) -> MatchData {
        let ratio2 = self.ratio * self.ratio;
        let data = feat_a
            .par_iter()
            .enumerate()
            .filter_map(|(ia, da)| {
                let mut best = (usize::MAX, f32::MAX);
                let mut second = f32::MAX;
                for (ib, db) in feat_b.iter().enumerate() {
                    let d = da.distance_sq(db);
                    if d < best.1 {
                        second = best.1;
                        best = (ib, d);
                    } else if d < second {
                        second = d;
                    }
                }
                if best.0 != usize::MAX && (second == f32::MAX || best.1 < ratio2 * second) {
                    Some((ia, best.0))
                } else {
                    None
                }
            })
            .collect();
        MatchData { data }
    }
}
