//! Seams to the collaborators the pipeline consumes but does not own.
//!
//! Every trait is `Sync`: the pipeline shares one instance across rayon workers.

use glam::UVec2;

use crate::blend::SampleMap;
use crate::features::{FeatureSet, MatchData};
use crate::types::{Image, MatchInfo};

/// Per-image keypoint extraction. Deterministic, does not touch the image.
pub trait FeatureDetector: Sync {
    fn detect(&self, img: &Image) -> FeatureSet;
}

/// Candidate correspondences between two feature sets.
pub trait FeatureMatcher: Sync {
    fn match_features(&self, feat_a: &FeatureSet, feat_b: &FeatureSet) -> MatchData;
}

/// Robust transform fitting.
pub trait TransformEstimator: Sync {
    /// Homography mapping `feat_b` coordinates into `feat_a`, or `None` when no
    /// acceptable transform exists.
    fn fit(&self, matches: &MatchData, feat_a: &FeatureSet, feat_b: &FeatureSet)
    -> Option<MatchInfo>;
}

/// Cylindrical unwrapping parameterised by the h-factor.
pub trait Warper: Sync {
    /// Warped copy of `img`, same size.
    fn warp_image(&self, h_factor: f64, img: &Image) -> Image;

    /// Move feature coordinates of a `width` x `height` image into warped space.
    fn warp_features(&self, h_factor: f64, width: u32, height: u32, feats: &mut FeatureSet);

    fn warp(&self, h_factor: f64, img: &mut Image, feats: &mut FeatureSet) {
        self.warp_features(h_factor, img.width(), img.height(), feats);
        *img = self.warp_image(h_factor, img);
    }
}

/// Compositing of remapped layers onto one canvas. One instance per render session.
pub trait Blender<'a> {
    /// Queue `img`, sampled through `samples`, with its top-left corner at `top_left` on the
    /// canvas.
    fn add_image(&mut self, top_left: UVec2, samples: SampleMap, img: &'a Image);

    /// Composite every queued layer into `canvas` and drop them.
    fn run(&mut self, canvas: &mut Image);
}
