//! Cylinder h-factor search.
//!
//! Images shot from a rotating camera are unwrapped onto a cylinder before fitting. A wrong
//! cylinder factor shows up as vertical drift when the pairwise transforms are chained across
//! the sequence; the search picks the factor whose chain drifts least.

use std::time::Instant;

use log::{debug, info};
use nalgebra as na;
use rayon::prelude::*;

use crate::bundle::{Bundle, ProjectionMethod};
use crate::config::StitchConfig;
use crate::error::{Phase, Result, StitchError};
use crate::features::{FeatureSet, MatchData};
use crate::traits::{FeatureMatcher, TransformEstimator, Warper};
use crate::types::{Homography, Image};

/// Outcome of chaining the right half of the sequence under one factor.
#[derive(Debug, Clone)]
pub struct WarpTrial {
    pub factor: f64,
    /// `y / x` of the last image's origin in the identity frame; `0` for an invalid trial.
    pub slope: f64,
    /// `chain[k]` maps image `identity + k + 1` into the identity image. `None` when a fit failed.
    pub chain: Option<Vec<Homography>>,
}

impl WarpTrial {
    pub fn invalid(factor: f64) -> WarpTrial {
        WarpTrial {
            factor,
            slope: 0.0,
            chain: None,
        }
    }
}

/// Best result of [`search_h_factor`].
#[derive(Debug, Clone)]
pub struct HFactorSearch {
    pub best_factor: f64,
    pub best_abs_slope: f64,
    pub best_chain: Vec<Homography>,
    /// Every `(factor, slope)` evaluated, in order.
    pub trials: Vec<(f64, f64)>,
}

/// Read-only inputs shared by every trial.
pub struct WarpContext<'a> {
    pub feats: &'a [FeatureSet],
    pub sizes: &'a [(u32, u32)],
    /// `matches[k]` pairs image `k` with `k + 1`.
    pub matches: &'a [MatchData],
    pub identity_idx: usize,
    pub estimator: &'a dyn TransformEstimator,
    pub warper: &'a dyn Warper,
}

/// Correspondences between every image and its successor. Independent of any warp.
pub fn sequential_match_data(feats: &[FeatureSet], matcher: &dyn FeatureMatcher) -> Vec<MatchData> {
    (0..feats.len().saturating_sub(1))
        .into_par_iter()
        .map(|k| matcher.match_features(&feats[k], &feats[k + 1]))
        .collect()
}

/// Warp the identity image and everything to its right with `factor`, refit each neighbour
/// pair on the cached correspondences and chain the result into the identity frame.
pub fn evaluate_h_factor(ctx: &WarpContext<'_>, factor: f64) -> WarpTrial {
    let n = ctx.feats.len();
    let mid = ctx.identity_idx;
    if mid + 1 >= n {
        return WarpTrial::invalid(factor);
    }

    // each worker owns one feature clone
    let now_feats: Vec<FeatureSet> = (mid..n)
        .into_par_iter()
        .map(|k| {
            let (w, h) = ctx.sizes[k];
            let mut f = ctx.feats[k].clone();
            ctx.warper.warp_features(factor, w, h, &mut f);
            f
        })
        .collect();

    // each worker writes one slot; collect() is the barrier before composition
    let fitted: Vec<Option<Homography>> = (1..now_feats.len())
        .into_par_iter()
        .map(|k| {
            ctx.estimator
                .fit(&ctx.matches[mid + k - 1], &now_feats[k - 1], &now_feats[k])
                .map(|info| info.homo)
        })
        .collect();
    let Some(mut chain) = fitted.into_iter().collect::<Option<Vec<_>>>() else {
        debug!("hfactor {:.4}: a pair failed to fit", factor);
        return WarpTrial::invalid(factor);
    };

    for k in 1..chain.len() {
        chain[k] = chain[k - 1].prod(&chain[k]);
    }
    let Some(last) = chain.last() else {
        return WarpTrial::invalid(factor);
    };
    let center = last.trans2d(&na::Vector2::zeros());
    let slope = center.y / center.x;
    debug!("hfactor {:.4}: slope {:.6}", factor, slope);
    WarpTrial {
        factor,
        slope,
        chain: Some(chain),
    }
}

/// `(factor, |slope|, chain)` of the best finite trial so far.
type Best = Option<(f64, f64, Vec<Homography>)>;

/// Refine the factor from `initial_h_factor` for at most `h_factor_rounds` rounds.
///
/// The step direction comes from the sign of the slope and from whether the first chained
/// image lies right or left of the identity; the step halves every round.
pub fn search_h_factor<F>(config: &StitchConfig, mut evaluate: F) -> Result<HFactorSearch>
where
    F: FnMut(f64) -> WarpTrial,
{
    let mut trials = Vec::new();
    let mut best: Best = None;
    // returns the trial's slope and where its first chained image lands
    let mut run = |factor: f64, best: &mut Best| -> Option<(f64, f64)> {
        let trial = evaluate(factor);
        trials.push((trial.factor, trial.slope));
        let chain = trial.chain?;
        let centerx2 = chain
            .first()
            .map_or(0.0, |h| h.trans2d(&na::Vector2::zeros()).x);
        let abs_slope = trial.slope.abs();
        // a non-finite slope never becomes best
        if abs_slope.is_finite() && best.as_ref().is_none_or(|(_, s, _)| abs_slope < *s) {
            *best = Some((trial.factor, abs_slope, chain));
        }
        Some((trial.slope, centerx2))
    };

    let mut factor = config.initial_h_factor;
    let Some((mut slope, centerx2)) = run(factor, &mut best) else {
        return Err(StitchError::ExhaustedSearch);
    };
    let order = if centerx2 > 0.0 { 1.0 } else { -1.0 };

    for k in 0..config.h_factor_rounds {
        if slope.abs() < config.slope_plain {
            break;
        }
        let dir = if slope < 0.0 { order } else { -order };
        factor += dir / (config.h_factor_step_divisor * 2f64.powi(k as i32));
        slope = run(factor, &mut best).map_or(0.0, |(slope, _)| slope);
    }
    drop(run);

    let (best_factor, best_abs_slope, best_chain) = best.ok_or(StitchError::ExhaustedSearch)?;
    Ok(HFactorSearch {
        best_factor,
        best_abs_slope,
        best_chain,
        trials,
    })
}

/// Warp-factor bundle: search the factor on the right half, warp every image and feature set
/// with it, fit the left half in reverse and chain everything into the middle image.
///
/// `imgs` and `feats` are left in warped space.
pub fn build_bundle_warp(
    imgs: &mut [Image],
    feats: &mut [FeatureSet],
    matcher: &dyn FeatureMatcher,
    estimator: &dyn TransformEstimator,
    warper: &dyn Warper,
    config: &StitchConfig,
) -> Result<Bundle> {
    let now = Instant::now();
    let n = imgs.len();
    if n == 0 {
        return Err(StitchError::NoImages);
    }
    let mid = n / 2;
    let sizes: Vec<(u32, u32)> = imgs.iter().map(|img| (img.width(), img.height())).collect();

    let timer = Instant::now();
    let matches = sequential_match_data(feats, matcher);
    debug!("match time: {:.3} secs", timer.elapsed().as_secs_f64());

    let (best_factor, best_chain) = if n - mid > 1 {
        let ctx = WarpContext {
            feats,
            sizes: &sizes,
            matches: &matches,
            identity_idx: mid,
            estimator,
            warper,
        };
        let search = search_h_factor(config, |factor| evaluate_h_factor(&ctx, factor))?;
        debug!("hfactor trials: {:?}", search.trials);
        (search.best_factor, search.best_chain)
    } else {
        (config.initial_h_factor, Vec::new())
    };
    info!("Best hfactor: {:.4}", best_factor);

    imgs.par_iter_mut()
        .zip(feats.par_iter_mut())
        .for_each(|(img, f)| warper.warp(best_factor, img, f));

    let mut bundle = Bundle::from_sizes(&sizes, mid);
    for (k, h) in ((mid + 1)..n).zip(best_chain) {
        bundle.components[k].homo = h;
    }

    // left half was not covered by the search: refit with the canonical warp,
    // every pair has to match
    let feats_ro: &[FeatureSet] = feats;
    let reverse: Vec<Result<Homography>> = (0..mid)
        .into_par_iter()
        .map(|i| {
            let m = matches[i].reversed();
            estimator
                .fit(&m, &feats_ro[i + 1], &feats_ro[i])
                .map(|info| info.homo)
                .ok_or(StitchError::FitFailed {
                    phase: Phase::ReverseFitting,
                    i,
                    j: i + 1,
                })
        })
        .collect();
    for (i, h) in reverse.into_iter().enumerate() {
        bundle.components[i].homo = h?;
    }
    for i in (0..mid.saturating_sub(1)).rev() {
        let next = bundle.components[i + 1].homo;
        bundle.components[i].homo = next.prod(&bundle.components[i].homo);
    }

    bundle.proj_method = ProjectionMethod::Flat;
    bundle.h_factor = Some(best_factor);
    bundle.calc_inverse_homo()?;
    info!("build_bundle_warp: {:.3} sec", now.elapsed().as_secs_f64());
    Ok(bundle)
}
