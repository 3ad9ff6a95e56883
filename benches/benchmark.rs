use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::Rgb;
use nalgebra as na;
use panorama_stitch::blend::render;
use panorama_stitch::blender::LinearBlender;
use panorama_stitch::bundle::{Bundle, ProjectionMethod};
use panorama_stitch::camera::homography_to_focal;
use panorama_stitch::optimization::dlt_homography;
use panorama_stitch::traits::Warper;
use panorama_stitch::types::{Homography, Image};
use panorama_stitch::warp::CylinderWarper;

fn bench_homography(c: &mut Criterion) {
    let h = Homography::new(na::Matrix3::new(
        0.98, -0.05, 12.0, 0.04, 1.02, -7.0, 1e-4, -5e-5, 1.0,
    ));
    let src: Vec<na::Vector2<f64>> = (0..50)
        .map(|k| na::Vector2::new((k % 10) as f64 * 20.0 - 90.0, (k / 10) as f64 * 30.0 - 60.0))
        .collect();
    let dst: Vec<_> = src.iter().map(|p| h.trans2d(p)).collect();
    c.bench_function("dlt_homography", |b| {
        b.iter(|| dlt_homography(black_box(&src), black_box(&dst)))
    });

    let f = 1000.0;
    let k = na::Matrix3::new(f, 0.0, 0.0, 0.0, f, 0.0, 0.0, 0.0, 1.0);
    let axis = na::Unit::new_normalize(na::Vector3::new(1.0, 1.0, 0.5));
    let r = na::Rotation3::from_axis_angle(&axis, 0.2).into_inner();
    let hk = k * r * k.try_inverse().unwrap_or_else(na::Matrix3::identity);
    c.bench_function("homography_to_focal", |b| {
        b.iter(|| homography_to_focal(black_box(&hk)))
    });
}

fn bench_render(c: &mut Criterion) {
    let img = Image::from_fn(320, 240, |x, y| Rgb([x as f32 / 320.0, y as f32 / 240.0, 0.5]));
    let imgs = vec![img.clone(), img.clone(), img];
    let mut bundle = Bundle::from_sizes(&[(320, 240); 3], 1);
    bundle.components[0].homo = Homography::translation(-200.0, 0.0);
    bundle.components[2].homo = Homography::translation(200.0, 0.0);
    bundle.proj_method = ProjectionMethod::Cylindrical;
    if bundle.calc_inverse_homo().is_err() {
        return;
    }
    bundle.update_proj_range();
    c.bench_function("render_cylindrical_3x320x240", |b| {
        b.iter(|| render(&bundle, &imgs, &mut LinearBlender::new(), u64::MAX))
    });

    c.bench_function("cylinder_warp_320x240", |b| {
        b.iter(|| CylinderWarper.warp_image(black_box(1.0), &imgs[0]))
    });
}

criterion_group!(benches, bench_homography, bench_render);
criterion_main!(benches);
