use log::{debug, info};
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::connectivity::PairwiseGraph;
use crate::types::Image;

const CONFIDENCE_EPS: f64 = 1e-6;

/// Per-image focal length hint. Not required to be physically exact.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Camera {
    pub focal: f64,
}

pub fn homography_to_focal(h_mat: &na::Matrix3<f64>) -> Option<f64> {
    let h0 = h_mat[(0, 0)];
    let h1 = h_mat[(0, 1)];
    let h2 = h_mat[(0, 2)];
    let h3 = h_mat[(1, 0)];
    let h4 = h_mat[(1, 1)];
    let h5 = h_mat[(1, 2)];
    let h6 = h_mat[(2, 0)];
    let h7 = h_mat[(2, 1)];

    let pick = |d1: f64, d2: f64, v1: f64, v2: f64| {
        let (v1, v2) = if v1 < v2 { (v2, v1) } else { (v1, v2) };
        if v1 > 0.0 && v2 > 0.0 {
            if d1.abs() > d2.abs() {
                Some(v1.sqrt())
            } else {
                Some(v2.sqrt())
            }
        } else if v1 > 0.0 {
            Some(v1.sqrt())
        } else {
            None
        }
    };

    let d1 = h6 * h7;
    let d2 = (h7 - h6) * (h7 + h6);
    let f1 = pick(
        d1,
        d2,
        -(h0 * h1 + h3 * h4) / d1,
        (h0 * h0 + h3 * h3 - h1 * h1 - h4 * h4) / d2,
    );

    let d1 = h0 * h3 + h1 * h4;
    let d2 = h0 * h0 + h1 * h1 - h3 * h3 - h4 * h4;
    let f0 = pick(d1, d2, -h2 * h5 / d1, (h5 * h5 - h2 * h2) / d2);

    let f = match (f0, f1) {
        (Some(f0), Some(f1)) => Some((f0 * f1).sqrt()),
        (Some(f0), None) => Some(f0),
        (None, Some(f1)) => Some(f1),
        _ => None,
    };
    f.filter(|f| f.is_finite())
}

/// Median focal over every confident edge of the graph.
///
/// `None` when fewer than `min(n - 1, 3)` edges give an estimate.
pub fn estimate_focal(graph: &PairwiseGraph) -> Option<f64> {
    let n = graph.num_images();
    let mut estimates: Vec<f64> = graph
        .edges()
        .filter(|(_, _, info)| info.confidence >= CONFIDENCE_EPS)
        .filter_map(|(_, _, info)| homography_to_focal(info.homo.matrix()))
        .collect();
    debug!("{} focal estimates from {} edges", estimates.len(), graph.num_edges());
    if estimates.is_empty() || estimates.len() < n.saturating_sub(1).min(3) {
        return None;
    }
    estimates.sort_by(|a, b| a.total_cmp(b));
    Some(estimates[estimates.len() / 2])
}

/// One camera per image: the graph estimate when there is one, the aspect heuristic otherwise.
pub fn estimate_cameras(graph: &PairwiseGraph, imgs: &[Image]) -> Vec<Camera> {
    match estimate_focal(graph) {
        Some(focal) if focal > 0.0 => {
            info!("estimated focal: {:.3}", focal);
            vec![Camera { focal }; imgs.len()]
        }
        _ => {
            info!("focal estimation inconclusive, using aspect heuristic");
            imgs.iter()
                .map(|img| Camera {
                    focal: img.width() as f64 / img.height() as f64 * 0.5,
                })
                .collect()
        }
    }
}
