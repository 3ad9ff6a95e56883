pub mod homography;
pub mod linear;
pub mod warp_search;

pub use homography::*;
pub use linear::*;
pub use warp_search::*;
