pub mod blend;
pub mod blender;
pub mod bundle;
pub mod camera;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod features;
pub mod io;
pub mod optimization;
pub mod perspective;
pub mod stitcher;
pub mod traits;
pub mod types;
pub mod util;
pub mod warp;

pub use config::{ConnectivityMode, StitchConfig, StitchMode};
pub use error::{Result, StitchError};
pub use stitcher::{Stitcher, stitch};
pub use types::{Homography, Image, MatchInfo};
