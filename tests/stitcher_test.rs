mod common;

use common::{DotDetector, NoopWarper, dot_scene, init_logger, noise_image, sliding_crops};
use nalgebra as na;
use panorama_stitch::blend::CanvasGeometry;
use panorama_stitch::blender::interpolate;
use panorama_stitch::bundle::ProjectionMethod;
use panorama_stitch::config::{ConnectivityMode, StitchConfig};
use panorama_stitch::error::StitchError;
use panorama_stitch::types::{Image, is_no_color};
use panorama_stitch::util::coverage;
use panorama_stitch::{Stitcher, stitch};

#[test]
fn identical_images_fill_one_frame() {
    init_logger();
    let img = dot_scene(120, 90, 13);
    let imgs = vec![img.clone(), img.clone(), img.clone()];
    let mut stitcher = Stitcher::new(imgs, &DotDetector, StitchConfig::default());
    let canvas = stitcher.build().unwrap();

    let bundle = stitcher.bundle().unwrap();
    assert_eq!(bundle.proj_method, ProjectionMethod::Cylindrical);
    assert_eq!(bundle.identity_idx, 1);
    for comp in &bundle.components {
        assert!(comp.homo.is_identity(1e-6), "{:?}", comp.homo);
    }
    assert_eq!(stitcher.cameras().len(), 3);
    assert_eq!(stitcher.graph().num_edges(), 3);

    let (w, h) = canvas.dimensions();
    assert!(w.abs_diff(120) <= 1, "width {}", w);
    assert!((90..=108).contains(&h), "height {}", h);

    // every interior pixel of the middle row comes from the image
    let mid = h / 2;
    for x in 2..w - 2 {
        assert!(!is_no_color(canvas.get_pixel(x, mid)), "hole at {}", x);
    }

    // centre pixel is the middle image's content at the same spot
    let geometry = CanvasGeometry::for_bundle(bundle).unwrap();
    let comp = bundle.identity().unwrap();
    let c = na::Vector2::new((w / 2) as f64, mid as f64);
    let src = comp
        .homo_inv
        .trans_normalize(&bundle.proj_to_homo(&geometry.canvas_to_proj(&c)))
        .unwrap()
        + comp.half_size();
    let expected = interpolate(&stitcher.images()[1], src.x, src.y).unwrap();
    let got = canvas.get_pixel(w / 2, mid);
    for k in 0..3 {
        assert!((got.0[k] - expected.0[k]).abs() < 1e-3);
    }
}

#[test]
fn mismatched_ring_pair_aborts() {
    init_logger();
    let scene = dot_scene(220, 80, 17);
    let mut imgs = sliding_crops(&scene, 3, 30, 160);
    imgs.insert(2, noise_image(160, 80, 5));
    let err = stitch(imgs, &DotDetector, StitchConfig::default()).unwrap_err();
    assert!(matches!(err, StitchError::MissingAdjacency { i: 1, j: 2 }), "{err}");
    assert!(err.to_string().contains("image 1 and 2"));
}

#[test]
fn full_pairwise_uses_connected_subgraph() {
    init_logger();
    let scene = dot_scene(220, 80, 19);
    let mut imgs = sliding_crops(&scene, 3, 30, 160);
    imgs.push(noise_image(160, 80, 8));
    let config = StitchConfig {
        connectivity: ConnectivityMode::FullPairwise,
        ..Default::default()
    };
    let mut stitcher = Stitcher::new(imgs, &DotDetector, config);
    let canvas = stitcher.build().unwrap();

    let bundle = stitcher.bundle().unwrap();
    let placed: Vec<usize> = bundle.components.iter().map(|c| c.image_idx).collect();
    assert_eq!(placed, vec![0, 1, 2]);
    assert_eq!(bundle.identity_idx, 1);
    assert!(bundle.component(3).is_none());
    assert_eq!(stitcher.graph().neighbors(3).count(), 0);
    assert!(canvas.width() > 160 && canvas.width() < 240, "{}", canvas.width());
}

#[test]
fn panoramic_strip_is_corrected_to_rectangle() {
    init_logger();
    let scene = dot_scene(180, 90, 23);
    let imgs = sliding_crops(&scene, 3, 30, 120);
    let mut stitcher =
        Stitcher::new(imgs, &DotDetector, StitchConfig::panoramic()).with_warper(NoopWarper);
    let out = stitcher.build().unwrap();

    let bundle = stitcher.bundle().unwrap();
    assert_eq!(bundle.proj_method, ProjectionMethod::Flat);
    assert_eq!(bundle.h_factor, Some(1.0));
    let (w, h) = out.dimensions();
    assert!(w.abs_diff(180) <= 1 && h.abs_diff(90) <= 1, "{}x{}", w, h);

    // the strip reassembles the scene
    let got = out.get_pixel(w / 2, h / 2);
    let want = scene.get_pixel(w / 2, h / 2);
    for k in 0..3 {
        assert!((got.0[k] - want.0[k]).abs() < 0.05, "{:?} vs {:?}", got, want);
    }
}

#[test]
fn panoramic_with_cylinder_warper() {
    init_logger();
    let scene = dot_scene(240, 100, 29);
    let imgs = sliding_crops(&scene, 3, 40, 160);
    let mut stitcher = Stitcher::new(imgs, &DotDetector, StitchConfig::panoramic());
    let out = stitcher.build().unwrap();

    let bundle = stitcher.bundle().unwrap();
    assert_eq!(bundle.proj_method, ProjectionMethod::Flat);
    let h_factor = bundle.h_factor.unwrap();
    assert!(h_factor.is_finite() && h_factor > 0.0);

    let (w, h) = out.dimensions();
    assert!(w > 160 && w < 320, "width {}", w);
    assert!((80..=140).contains(&h), "height {}", h);
    assert!(coverage(&out) > 0.75, "coverage {}", coverage(&out));
    assert!(!is_no_color(out.get_pixel(w / 2, h / 2)));
}

#[test]
fn empty_input_is_an_error() {
    let err = stitch(Vec::<Image>::new(), &DotDetector, StitchConfig::default()).unwrap_err();
    assert!(matches!(err, StitchError::NoImages));
    let err = stitch(Vec::new(), &DotDetector, StitchConfig::panoramic()).unwrap_err();
    assert!(matches!(err, StitchError::NoImages));
}
