use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;

use crate::blend::render;
use crate::blender::LinearBlender;
use crate::bundle::{Bundle, ProjectionMethod};
use crate::camera::{Camera, estimate_cameras};
use crate::config::{ConnectivityMode, StitchConfig, StitchMode};
use crate::connectivity::{PairwiseGraph, assume_pano_pairwise, pairwise_match};
use crate::error::{Result, StitchError};
use crate::features::{BruteForceMatcher, FeatureSet};
use crate::optimization::{
    RansacEstimator, build_bundle_linear_simple, build_bundle_spanning_tree, build_bundle_warp,
};
use crate::perspective::perspective_correction;
use crate::traits::{FeatureDetector, FeatureMatcher, TransformEstimator, Warper};
use crate::types::Image;
use crate::warp::CylinderWarper;

/// Owns the image sequence and drives the whole pipeline.
pub struct Stitcher<'c> {
    imgs: Vec<Image>,
    feats: Vec<FeatureSet>,
    cameras: Vec<Camera>,
    graph: PairwiseGraph,
    bundle: Option<Bundle>,
    config: StitchConfig,
    detector: &'c dyn FeatureDetector,
    matcher: Box<dyn FeatureMatcher + 'c>,
    estimator: Box<dyn TransformEstimator + 'c>,
    warper: Box<dyn Warper + 'c>,
}

impl<'c> Stitcher<'c> {
    /// Brute-force matching, RANSAC fitting and cylindrical warping unless replaced.
    pub fn new(
        imgs: Vec<Image>,
        detector: &'c dyn FeatureDetector,
        config: StitchConfig,
    ) -> Stitcher<'c> {
        let n = imgs.len();
        Stitcher {
            imgs,
            feats: vec![FeatureSet::new(); n],
            cameras: vec![Camera::default(); n],
            graph: PairwiseGraph::new(n),
            bundle: None,
            config,
            detector,
            matcher: Box::new(BruteForceMatcher::default()),
            estimator: Box::new(RansacEstimator::default()),
            warper: Box::new(CylinderWarper),
        }
    }

    pub fn with_matcher(mut self, matcher: impl FeatureMatcher + 'c) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_estimator(mut self, estimator: impl TransformEstimator + 'c) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn with_warper(mut self, warper: impl Warper + 'c) -> Self {
        self.warper = Box::new(warper);
        self
    }

    pub fn images(&self) -> &[Image] {
        &self.imgs
    }

    pub fn features(&self) -> &[FeatureSet] {
        &self.feats
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn graph(&self) -> &PairwiseGraph {
        &self.graph
    }

    pub fn bundle(&self) -> Option<&Bundle> {
        self.bundle.as_ref()
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    fn sizes(&self) -> Vec<(u32, u32)> {
        self.imgs.iter().map(|img| (img.width(), img.height())).collect()
    }

    /// Detect features on every image, one worker per image.
    pub fn calc_feature(&mut self) {
        let now = Instant::now();
        let detector = self.detector;
        self.feats = self
            .imgs
            .par_iter()
            .enumerate()
            .map(|(k, img)| {
                let f = detector.detect(img);
                debug!("Image {} has {} features", k, f.len());
                f
            })
            .collect();
        info!("calc_feature: {:.3} sec", now.elapsed().as_secs_f64());
    }

    fn estimate_camera(&mut self) {
        self.cameras = estimate_cameras(&self.graph, &self.imgs);
    }

    /// Build the bundle for the configured mode, with its projected range filled in.
    pub fn build_bundle(&mut self) -> Result<&Bundle> {
        if self.imgs.is_empty() {
            return Err(StitchError::NoImages);
        }
        self.calc_feature();
        let mut bundle = match self.config.mode {
            StitchMode::Panoramic => {
                let mut bundle = build_bundle_warp(
                    &mut self.imgs,
                    &mut self.feats,
                    self.matcher.as_ref(),
                    self.estimator.as_ref(),
                    self.warper.as_ref(),
                    &self.config,
                )?;
                bundle.proj_method = ProjectionMethod::Flat;
                bundle
            }
            StitchMode::Linear => {
                let sizes = self.sizes();
                let mut bundle = match self.config.connectivity {
                    ConnectivityMode::Ring => {
                        self.graph = assume_pano_pairwise(
                            &self.feats,
                            self.matcher.as_ref(),
                            self.estimator.as_ref(),
                        )?;
                        self.estimate_camera();
                        build_bundle_linear_simple(&self.graph, &sizes)?
                    }
                    ConnectivityMode::FullPairwise => {
                        self.graph = pairwise_match(
                            &self.feats,
                            self.matcher.as_ref(),
                            self.estimator.as_ref(),
                        );
                        self.estimate_camera();
                        build_bundle_spanning_tree(&self.graph, &sizes)?
                    }
                };
                bundle.proj_method = ProjectionMethod::Cylindrical;
                bundle
            }
        };
        info!("Using projection method: {:?}", bundle.proj_method);
        bundle.update_proj_range();
        Ok(&*self.bundle.insert(bundle))
    }

    /// Run the whole pipeline and return the finished canvas.
    pub fn build(&mut self) -> Result<Image> {
        let now = Instant::now();
        self.build_bundle()?;
        let Some(bundle) = self.bundle.as_ref() else {
            return Err(StitchError::NoImages);
        };
        let canvas = render(
            bundle,
            &self.imgs,
            &mut LinearBlender::new(),
            self.config.max_canvas_pixels,
        )?;
        let ret = match self.config.mode {
            StitchMode::Panoramic => {
                perspective_correction(bundle, &canvas, &mut LinearBlender::new())?
            }
            StitchMode::Linear => canvas,
        };
        info!("stitch: {:.3} sec", now.elapsed().as_secs_f64());
        Ok(ret)
    }
}

/// Stitch `imgs` into one canvas with the default collaborators.
pub fn stitch(
    imgs: Vec<Image>,
    detector: &dyn FeatureDetector,
    config: StitchConfig,
) -> Result<Image> {
    Stitcher::new(imgs, detector, config).build()
}
