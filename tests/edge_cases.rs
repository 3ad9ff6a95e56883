mod common;

use common::{DotDetector, dot_scene, init_logger, sliding_crops};
use image::Rgb;
use panorama_stitch::config::StitchConfig;
use panorama_stitch::types::{Image, is_no_color};
use panorama_stitch::util::{coverage, to_rgb8};
use panorama_stitch::{Stitcher, stitch};

#[test]
fn single_image_linear() {
    init_logger();
    let img = dot_scene(64, 48, 1);
    let mut stitcher = Stitcher::new(vec![img], &DotDetector, StitchConfig::default());
    let canvas = stitcher.build().unwrap();
    assert_eq!(stitcher.graph().num_edges(), 0);
    assert_eq!(stitcher.bundle().unwrap().len(), 1);
    // no edges: focal falls back to the aspect heuristic
    assert_eq!(stitcher.cameras()[0].focal, 64.0 / 48.0 * 0.5);
    assert!(canvas.width().abs_diff(64) <= 1);
    assert!(coverage(&canvas) > 0.85);
}

#[test]
fn single_image_panoramic_keeps_size() {
    init_logger();
    let img = Image::from_pixel(50, 40, Rgb([0.2, 0.4, 0.6]));
    let out = stitch(vec![img], &DotDetector, StitchConfig::panoramic()).unwrap();
    assert_eq!(out.dimensions(), (50, 40));
    assert!(!is_no_color(out.get_pixel(25, 20)));
}

#[test]
fn two_images_ring() {
    init_logger();
    let scene = dot_scene(200, 80, 31);
    let imgs = sliding_crops(&scene, 2, 40, 160);
    let mut stitcher = Stitcher::new(imgs, &DotDetector, StitchConfig::default());
    let canvas = stitcher.build().unwrap();
    assert_eq!(stitcher.graph().num_edges(), 1);
    let bundle = stitcher.bundle().unwrap();
    assert_eq!(bundle.identity_idx, 1);
    assert!(canvas.width() > 160);
    let rgb = to_rgb8(&canvas);
    assert_eq!(rgb.dimensions(), canvas.dimensions());
}
