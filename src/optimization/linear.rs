use std::collections::HashMap;

use log::{debug, info};

use crate::bundle::{Bundle, Component};
use crate::connectivity::PairwiseGraph;
use crate::error::{Result, StitchError};
use crate::types::Homography;

/// Transform taking image `from` into its neighbour `to`.
fn link(graph: &PairwiseGraph, from: usize, to: usize) -> Result<Homography> {
    graph
        .get(to, from)
        .map(|info| info.homo)
        .ok_or(StitchError::MissingAdjacency { i: to, j: from })
}

/// Compose ring neighbours outward from the middle image. No optimisation: the pairwise
/// transforms are taken to be consistent.
pub fn build_bundle_linear_simple(graph: &PairwiseGraph, sizes: &[(u32, u32)]) -> Result<Bundle> {
    let n = sizes.len();
    if n == 0 {
        return Err(StitchError::NoImages);
    }
    let mid = n / 2;
    let mut bundle = Bundle::from_sizes(sizes, mid);

    for k in (mid + 1)..n {
        let prev = bundle.components[k - 1].homo;
        bundle.components[k].homo = prev.prod(&link(graph, k, k - 1)?);
    }
    for k in (0..mid).rev() {
        let next = bundle.components[k + 1].homo;
        bundle.components[k].homo = next.prod(&link(graph, k, k + 1)?);
    }
    // comp[k]: from k to identity
    bundle.calc_inverse_homo()?;
    info!("linear bundle over {} images, identity {}", n, mid);
    Ok(bundle)
}

/// Bundle over the largest connected component of an arbitrary graph.
///
/// The component's median image is the identity; every other member hangs off exactly one
/// parent of a maximum-confidence spanning tree. Images outside the component are not placed.
pub fn build_bundle_spanning_tree(graph: &PairwiseGraph, sizes: &[(u32, u32)]) -> Result<Bundle> {
    let components = graph.connected_components();
    let Some(members) = components.first() else {
        return Err(StitchError::NoImages);
    };
    let identity = members[members.len() / 2];

    let mut homos: HashMap<usize, Homography> = HashMap::from([(identity, Homography::identity())]);
    let mut order = vec![identity];
    while order.len() < members.len() {
        let mut best: Option<(usize, usize, f64)> = None;
        for &u in &order {
            for v in graph.neighbors(u) {
                if homos.contains_key(&v) {
                    continue;
                }
                let conf = graph.get(u, v).map_or(0.0, |m| m.confidence);
                if best.is_none_or(|(_, _, c)| conf > c) {
                    best = Some((u, v, conf));
                }
            }
        }
        let Some((parent, child, conf)) = best else {
            break;
        };
        let h = homos[&parent].prod(&link(graph, child, parent)?);
        debug!("image {} placed via {} (conf={:.3})", child, parent, conf);
        homos.insert(child, h);
        order.push(child);
    }

    let comps = members
        .iter()
        .map(|&idx| {
            let (w, h) = sizes[idx];
            let mut comp = Component::new(idx, w, h);
            comp.homo = homos[&idx];
            comp
        })
        .collect();
    let mut bundle = Bundle::new(comps, identity);
    bundle.calc_inverse_homo()?;
    info!(
        "spanning-tree bundle over {} of {} images, identity {}",
        bundle.len(),
        sizes.len(),
        identity
    );
    Ok(bundle)
}
