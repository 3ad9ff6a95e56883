use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::{object_from_json, object_to_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StitchMode {
    /// Cylindrical warp-factor search, flat projection, perspective correction.
    Panoramic,
    /// Pairwise transforms composed as-is, cylindrical projection.
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityMode {
    /// Image `i` against `i + 1 mod n`; every pair has to match.
    Ring,
    /// Every unordered pair; unmatched pairs are dropped.
    FullPairwise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    pub mode: StitchMode,
    /// Only consulted in [`StitchMode::Linear`].
    pub connectivity: ConnectivityMode,
    /// Drift `|y/x|` below which the h-factor search stops.
    pub slope_plain: f64,
    pub h_factor_rounds: usize,
    /// First refinement step is `1 / h_factor_step_divisor`, halved every round.
    pub h_factor_step_divisor: f64,
    pub initial_h_factor: f64,
    pub max_canvas_pixels: u64,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            mode: StitchMode::Linear,
            connectivity: ConnectivityMode::Ring,
            slope_plain: 8e-3,
            h_factor_rounds: 3,
            h_factor_step_divisor: 5.0,
            initial_h_factor: 1.0,
            max_canvas_pixels: 400_000_000,
        }
    }
}

impl StitchConfig {
    pub fn panoramic() -> StitchConfig {
        StitchConfig {
            mode: StitchMode::Panoramic,
            ..Default::default()
        }
    }

    pub fn from_json_file(path: &str) -> Result<StitchConfig> {
        object_from_json(path)
    }

    pub fn to_json_file(&self, path: &str) -> Result<()> {
        object_to_json(path, self)
    }
}
