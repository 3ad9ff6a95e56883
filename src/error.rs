use std::fmt;

use thiserror::Error;

/// Pipeline phase named in fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RingConnectivity,
    WarpSearch,
    ReverseFitting,
    Composition,
    InverseHomography,
    CanvasRendering,
    PerspectiveCorrection,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::RingConnectivity => "ring connectivity",
            Phase::WarpSearch => "warp-factor search",
            Phase::ReverseFitting => "reverse fitting",
            Phase::Composition => "homography composition",
            Phase::InverseHomography => "inverse homography",
            Phase::CanvasRendering => "canvas rendering",
            Phase::PerspectiveCorrection => "perspective correction",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StitchError {
    #[error("no input images")]
    NoImages,
    /// A ring neighbour that has to match did not.
    #[error("image {i} and {j} don't match ({phase})", phase = Phase::RingConnectivity)]
    MissingAdjacency { i: usize, j: usize },
    #[error("image {i} and {j} don't match ({phase})")]
    FitFailed { phase: Phase, i: usize, j: usize },
    #[error("degenerate geometry at image {index} during {phase}")]
    Degenerate { phase: Phase, index: usize },
    #[error("failed to find h-factor: no warp trial produced a valid transform chain")]
    ExhaustedSearch,
    #[error("canvas of {width}x{height} pixels exceeds the configured limit")]
    CanvasTooLarge { width: u64, height: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StitchError {
    /// Image indices the error refers to, if any.
    pub fn indices(&self) -> Option<(usize, usize)> {
        match self {
            StitchError::MissingAdjacency { i, j } | StitchError::FitFailed { i, j, .. } => {
                Some((*i, *j))
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StitchError>;
