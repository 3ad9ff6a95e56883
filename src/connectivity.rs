use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;

use crate::error::{Phase, Result, StitchError};
use crate::features::FeatureSet;
use crate::traits::{FeatureMatcher, TransformEstimator};
use crate::types::MatchInfo;

/// Adjacency sets plus the sparse `(i, j) -> MatchInfo` table.
///
/// An edge exists only where fitting succeeded; both directions are always stored and the
/// `(j, i)` homography is the matrix inverse of `(i, j)`.
#[derive(Debug, Clone, Default)]
pub struct PairwiseGraph {
    adjacency: Vec<BTreeSet<usize>>,
    matches: HashMap<(usize, usize), MatchInfo>,
}

impl PairwiseGraph {
    pub fn new(num_images: usize) -> PairwiseGraph {
        PairwiseGraph {
            adjacency: vec![BTreeSet::new(); num_images],
            matches: HashMap::new(),
        }
    }

    pub fn num_images(&self) -> usize {
        self.adjacency.len()
    }

    pub fn num_edges(&self) -> usize {
        self.matches.len() / 2
    }

    /// Record `info` as the fit of `j` onto `i`, with its inverse as `(j, i)`.
    ///
    /// Returns `false` and leaves the graph untouched when the homography is singular.
    pub fn insert(&mut self, i: usize, j: usize, info: MatchInfo) -> bool {
        if i == j || i >= self.num_images() || j >= self.num_images() {
            return false;
        }
        let Some(rev) = info.reversed() else {
            return false;
        };
        self.adjacency[i].insert(j);
        self.adjacency[j].insert(i);
        self.matches.insert((i, j), info);
        self.matches.insert((j, i), rev);
        true
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&MatchInfo> {
        self.matches.get(&(i, j))
    }

    pub fn has_edge(&self, i: usize, j: usize) -> bool {
        self.matches.contains_key(&(i, j))
    }

    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency.get(i).into_iter().flatten().copied()
    }

    /// Every edge once, as `(i, j, info)` with `i < j`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &MatchInfo)> + '_ {
        self.matches
            .iter()
            .filter(|((i, j), _)| i < j)
            .map(|(&(i, j), info)| (i, j, info))
    }

    /// Connected components, each sorted, largest first (ties: lowest first index).
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.num_images();
        let mut seen = vec![false; n];
        let mut comps = Vec::new();
        for start in 0..n {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut stack = vec![start];
            let mut comp = Vec::new();
            while let Some(cur) = stack.pop() {
                comp.push(cur);
                for nb in self.neighbors(cur) {
                    if !seen[nb] {
                        seen[nb] = true;
                        stack.push(nb);
                    }
                }
            }
            comp.sort_unstable();
            comps.push(comp);
        }
        comps.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
        comps
    }
}

fn fit_pair(
    feats: &[FeatureSet],
    i: usize,
    j: usize,
    matcher: &dyn FeatureMatcher,
    estimator: &dyn TransformEstimator,
) -> Option<MatchInfo> {
    let matches = matcher.match_features(&feats[i], &feats[j]);
    estimator.fit(&matches, &feats[i], &feats[j])
}

/// Try every unordered pair. Pairs that fail to fit are left out of the graph.
pub fn pairwise_match(
    feats: &[FeatureSet],
    matcher: &dyn FeatureMatcher,
    estimator: &dyn TransformEstimator,
) -> PairwiseGraph {
    let now = Instant::now();
    let n = feats.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    let fitted: Vec<_> = pairs
        .par_iter()
        .map(|&(i, j)| (i, j, fit_pair(feats, i, j, matcher, estimator)))
        .collect();

    let mut graph = PairwiseGraph::new(n);
    for (i, j, info) in fitted {
        match info {
            Some(info) => {
                let (ninliers, conf) = (info.num_inliers(), info.confidence);
                if graph.insert(i, j, info) {
                    debug!(
                        "Connection between image {} and {}, ninliers={}, conf={:.3}",
                        i, j, ninliers, conf
                    );
                } else {
                    debug!("Image {} and {} fit a singular transform, dropped", i, j);
                }
            }
            None => debug!("Image {} and {} don't match", i, j),
        }
    }
    info!(
        "pairwise_match: {} edges among {} images in {:.3} sec",
        graph.num_edges(),
        n,
        now.elapsed().as_secs_f64()
    );
    graph
}

/// Ring pairs `(i, i + 1 mod n)`, each unordered pair once, self pairs skipped.
pub fn ring_pairs(n: usize) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for i in 0..n {
        let next = (i + 1) % n;
        if next == i || pairs.iter().any(|&(a, b)| (a, b) == (next, i)) {
            continue;
        }
        pairs.push((i, next));
    }
    pairs
}

/// Fit every image against its successor, wrapping around.
///
/// The input is taken to be an ordered panorama, so any failing pair is fatal.
pub fn assume_pano_pairwise(
    feats: &[FeatureSet],
    matcher: &dyn FeatureMatcher,
    estimator: &dyn TransformEstimator,
) -> Result<PairwiseGraph> {
    let now = Instant::now();
    let n = feats.len();
    let fitted: Vec<_> = ring_pairs(n)
        .into_par_iter()
        .map(|(i, j)| (i, j, fit_pair(feats, i, j, matcher, estimator)))
        .collect();

    let mut graph = PairwiseGraph::new(n);
    for (i, next, info) in fitted {
        let info = info.ok_or(StitchError::MissingAdjacency { i, j: next })?;
        debug!(
            "Match between image {} and {}, ninliers={}, conf={:.3}",
            i,
            next,
            info.num_inliers(),
            info.confidence
        );
        if !graph.insert(i, next, info) {
            return Err(StitchError::Degenerate {
                phase: Phase::RingConnectivity,
                index: i,
            });
        }
    }
    info!(
        "assume_pano_pairwise: {} pairs in {:.3} sec",
        graph.num_edges(),
        now.elapsed().as_secs_f64()
    );
    Ok(graph)
}
