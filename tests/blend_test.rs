use glam::UVec2;
use image::Rgb;
use nalgebra as na;
use panorama_stitch::blend::{
    CanvasGeometry, SampleMap, component_sample_map, render, within_bounds,
};
use panorama_stitch::blender::{LinearBlender, empty_canvas};
use panorama_stitch::bundle::Bundle;
use panorama_stitch::error::StitchError;
use panorama_stitch::traits::Blender;
use panorama_stitch::types::{Homography, Image, NO_COLOR, Range2D, is_no_color};

fn gradient(width: u32, height: u32) -> Image {
    Image::from_fn(width, height, |x, y| {
        Rgb([x as f32 / width as f32, y as f32 / height as f32, 0.5])
    })
}

#[test]
fn canvas_extent_scales_with_range() {
    let per_pixel = na::Vector2::new(0.5, 0.25);
    let base = Range2D::new(na::Vector2::new(-20.0, -10.0), na::Vector2::new(20.0, 10.0));
    let g1 = CanvasGeometry::new(&base, per_pixel).unwrap();
    assert_eq!((g1.width, g1.height), (80, 80));
    for c in [2.0, 3.0, 0.5] {
        let scaled = Range2D::new(base.min * c, base.max * c);
        let g = CanvasGeometry::new(&scaled, per_pixel).unwrap();
        assert_eq!(g.width, (g1.width as f64 * c) as u32);
        assert_eq!(g.height, (g1.height as f64 * c) as u32);
    }
    assert!(matches!(
        CanvasGeometry::new(&Range2D::empty(), per_pixel),
        Err(StitchError::Degenerate { .. })
    ));
}

#[test]
fn samples_outside_source_are_undefined() {
    let mut bundle = Bundle::from_sizes(&[(40, 30), (40, 30)], 0);
    bundle.components[1].homo = Homography::new(na::Matrix3::new(
        1.1, 0.05, 25.0, -0.02, 0.95, 4.0, 1e-3, 0.0, 1.0,
    ));
    bundle.calc_inverse_homo().unwrap();
    bundle.update_proj_range();
    let geometry = CanvasGeometry::for_bundle(&bundle).unwrap();

    let comp = &bundle.components[1];
    let (top_left, size) = geometry.placement(&comp.range);
    let samples = component_sample_map(&bundle, &geometry, comp, top_left, size);
    assert!(samples.num_defined() > 0);
    assert!(samples.num_defined() < samples.width() * samples.height());
    for y in 0..samples.height() {
        for x in 0..samples.width() {
            if let Some(p) = samples.get(x, y) {
                assert!(p.x >= 0.0 && p.y >= 0.0 && p.x < 40.0 && p.y < 30.0, "{:?}", p);
            }
        }
    }
    assert_eq!(samples.get(samples.width(), 0), None);
}

#[test]
fn within_bounds_is_half_open() {
    assert!(within_bounds(na::Vector2::new(0.0, 0.0), 4, 3).is_some());
    assert!(within_bounds(na::Vector2::new(3.999, 2.5), 4, 3).is_some());
    assert!(within_bounds(na::Vector2::new(4.0, 1.0), 4, 3).is_none());
    assert!(within_bounds(na::Vector2::new(-0.001, 1.0), 4, 3).is_none());
    assert!(within_bounds(na::Vector2::new(f64::NAN, 1.0), 4, 3).is_none());
}

#[test]
fn single_identity_image_renders_unchanged() {
    let img = gradient(48, 32);
    let mut bundle = Bundle::from_sizes(&[(48, 32)], 0);
    bundle.update_proj_range();
    let canvas = render(
        &bundle,
        std::slice::from_ref(&img),
        &mut LinearBlender::new(),
        u64::MAX,
    )
    .unwrap();
    assert_eq!(canvas.dimensions(), (48, 32));
    for (a, b) in canvas.pixels().zip(img.pixels()) {
        for c in 0..3 {
            assert!((a.0[c] - b.0[c]).abs() < 1e-5);
        }
    }
}

#[test]
fn oversized_canvas_is_rejected() {
    let img = gradient(48, 32);
    let mut bundle = Bundle::from_sizes(&[(48, 32)], 0);
    bundle.update_proj_range();
    let err = render(
        &bundle,
        std::slice::from_ref(&img),
        &mut LinearBlender::new(),
        100,
    )
    .unwrap_err();
    assert!(matches!(err, StitchError::CanvasTooLarge { width: 48, height: 32 }));
}

#[test]
fn blender_averages_overlap_and_keeps_gaps() {
    let red = Image::from_pixel(4, 4, Rgb([1.0, 0.0, 0.0]));
    let blue = Image::from_pixel(4, 4, Rgb([0.0, 0.0, 1.0]));
    let identity = || SampleMap::from_fn(4, 4, |x, y| Some(na::Vector2::new(x as f64, y as f64)));

    let mut blender = LinearBlender::new();
    blender.add_image(UVec2::new(0, 0), identity(), &red);
    blender.add_image(UVec2::new(2, 0), identity(), &blue);
    assert_eq!(blender.num_layers(), 2);
    let mut canvas = empty_canvas(8, 5);
    blender.run(&mut canvas);
    assert_eq!(blender.num_layers(), 0);

    assert_eq!(*canvas.get_pixel(0, 0), Rgb([1.0, 0.0, 0.0]));
    assert_eq!(*canvas.get_pixel(5, 1), Rgb([0.0, 0.0, 1.0]));
    let mixed = canvas.get_pixel(3, 1);
    assert!(mixed.0[0] > 0.0 && mixed.0[2] > 0.0);
    assert!((mixed.0[0] + mixed.0[2] - 1.0).abs() < 1e-5);
    assert!(is_no_color(canvas.get_pixel(7, 4)));
    assert_eq!(*canvas.get_pixel(7, 0), NO_COLOR);
}
