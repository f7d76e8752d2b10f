use glam::{Mat3, Vec3};
use image::{Rgb, RgbImage};

use crate::sensor_pipeline::camera::{
    CameraModel, CameraRig, DepthCalibration, Distortion, ExtrinsicTransform, Intrinsics,
};
use crate::sensor_pipeline::common::error::PipelineError;
use crate::sensor_pipeline::projection::{
    BoundingRegion, CpuProjector, ParallelProjector, PointBuffer, PointSample, ProjectionConfig,
    ProjectionInput, ProjectionStrategy, Projector, Rejection,
};
use crate::sensor_pipeline::stream::DepthImage;

fn pinhole_model(width: u32, height: u32, focal: f64) -> CameraModel {
    CameraModel::new(
        width,
        height,
        Intrinsics {
            fx: focal,
            fy: focal,
            cx: (width - 1) as f64 / 2.0,
            cy: (height - 1) as f64 / 2.0,
        },
        Distortion::default(),
    )
}

/// 5x5 depth and color cameras sharing one optical center.
fn coincident_rig() -> CameraRig {
    let model = pinhole_model(5, 5, 5.0);
    CameraRig::new(model.clone(), model, ExtrinsicTransform::identity())
}

fn single_pixel_depth(x: usize, y: usize, raw: u16) -> DepthImage {
    let mut samples = vec![0u16; 25];
    samples[y * 5 + x] = raw;
    DepthImage::new(5, 5, samples).unwrap()
}

fn project(rig: &CameraRig, depth: &DepthImage, color: &RgbImage, config: ProjectionConfig) -> PointBuffer {
    let input = ProjectionInput {
        rig,
        depth,
        color,
        timestamp: 42,
        frame_index: 3,
    };
    CpuProjector::new(config).project(&input).unwrap()
}

fn sorted(points: &[PointSample]) -> Vec<PointSample> {
    let mut points = points.to_vec();
    points.sort_by_key(|p| {
        (
            p.position.x.to_bits(),
            p.position.y.to_bits(),
            p.position.z.to_bits(),
            p.color,
        )
    });
    points
}

#[test]
fn test_center_pixel_projects_onto_optical_axis() {
    let rig = coincident_rig();
    let depth = single_pixel_depth(2, 2, 2000);
    let mut color = RgbImage::from_pixel(5, 5, Rgb([10, 10, 10]));
    color.put_pixel(2, 2, Rgb([200, 100, 50]));

    let buffer = project(&rig, &depth, &color, ProjectionConfig::default());

    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.points[0].position, Vec3::new(0.0, 0.0, 2.0));
    assert_eq!(buffer.points[0].color, [200, 100, 50, 255]);
    assert_eq!(buffer.timestamp, 42);
    assert_eq!(buffer.frame_index, 3);
    assert_eq!(buffer.stats.considered, 25);
    assert_eq!(buffer.stats.invalid_depth, 24);
}

#[test]
fn test_zero_depth_never_produces_points() {
    let rig = CameraRig::new(
        pinhole_model(5, 5, 5.0).with_depth_calibration(DepthCalibration {
            scale: 1.0,
            bias: 100.0,
            units_per_meter: 1000.0,
        }),
        pinhole_model(5, 5, 5.0),
        ExtrinsicTransform::identity(),
    );
    let depth = DepthImage::new(5, 5, vec![0; 25]).unwrap();
    let color = RgbImage::from_pixel(5, 5, Rgb([255, 255, 255]));

    let buffer = project(&rig, &depth, &color, ProjectionConfig::default());
    assert!(buffer.is_empty());
    assert_eq!(buffer.stats.count(Rejection::InvalidDepth), 25);
}

#[test]
fn test_black_threshold() {
    let rig = coincident_rig();
    let depth = single_pixel_depth(2, 2, 1000);
    let color = RgbImage::from_pixel(5, 5, Rgb([5, 3, 5]));

    let buffer = project(&rig, &depth, &color, ProjectionConfig::default());
    assert!(buffer.is_empty());
    assert_eq!(buffer.stats.black_color, 1);

    let config = ProjectionConfig::builder().black_threshold(4).build();
    let buffer = project(&rig, &depth, &color, config);
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.points[0].color, [5, 3, 5, 255]);
}

#[test]
fn test_point_outside_color_image_is_rejected() {
    let model = pinhole_model(5, 5, 5.0);
    let extrinsics = ExtrinsicTransform {
        rotation: Mat3::IDENTITY,
        translation: Vec3::new(10.0, 0.0, 0.0),
    };
    let rig = CameraRig::new(model.clone(), model, extrinsics);
    let depth = single_pixel_depth(2, 2, 2000);
    let color = RgbImage::from_pixel(5, 5, Rgb([255, 255, 255]));

    let buffer = project(&rig, &depth, &color, ProjectionConfig::default());
    assert!(buffer.is_empty());
    assert_eq!(buffer.stats.out_of_color_image, 1);
}

#[test]
fn test_point_behind_color_camera_is_rejected() {
    let model = pinhole_model(5, 5, 5.0);
    let extrinsics = ExtrinsicTransform {
        rotation: Mat3::IDENTITY,
        translation: Vec3::new(0.0, 0.0, -5.0),
    };
    let rig = CameraRig::new(model.clone(), model, extrinsics);
    let depth = single_pixel_depth(2, 2, 2000);
    let color = RgbImage::from_pixel(5, 5, Rgb([255, 255, 255]));

    let buffer = project(&rig, &depth, &color, ProjectionConfig::default());
    assert!(buffer.is_empty());
    assert_eq!(buffer.stats.behind_color_camera, 1);
}

#[test]
fn test_flipped_color_rows() {
    let rig = coincident_rig();
    let depth = single_pixel_depth(2, 1, 1000);
    let color = RgbImage::from_fn(5, 5, |_, y| match y {
        1 => Rgb([255, 0, 0]),
        3 => Rgb([0, 0, 255]),
        _ => Rgb([0, 255, 0]),
    });

    let buffer = project(&rig, &depth, &color, ProjectionConfig::default());
    assert_eq!(buffer.points[0].color, [255, 0, 0, 255]);

    let config = ProjectionConfig::builder().flip_color_rows(true).build();
    let buffer = project(&rig, &depth, &color, config);
    assert_eq!(buffer.points[0].color, [0, 0, 255, 255]);
}

#[test]
fn test_bounding_region_culls_unless_showing_all() {
    let rig = coincident_rig();
    let depth = single_pixel_depth(2, 2, 2000);
    let color = RgbImage::from_pixel(5, 5, Rgb([255, 255, 255]));

    let inside = BoundingRegion::axis_aligned(Vec3::new(0.0, 0.0, 2.0), Vec3::ONE).unwrap();
    let config = ProjectionConfig::builder().bounds(Some(inside)).build();
    assert_eq!(project(&rig, &depth, &color, config).len(), 1);

    let far = BoundingRegion::axis_aligned(Vec3::new(5.0, 5.0, 5.0), Vec3::ONE).unwrap();
    let config = ProjectionConfig::builder().bounds(Some(far)).build();
    let buffer = project(&rig, &depth, &color, config);
    assert!(buffer.is_empty());
    assert_eq!(buffer.stats.outside_bounds, 1);

    let config = ProjectionConfig::builder()
        .bounds(Some(far))
        .show_all_points(true)
        .build();
    assert_eq!(project(&rig, &depth, &color, config).len(), 1);
}

#[test]
fn test_rotated_bounding_region() {
    let rotation = glam::Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
    let region = BoundingRegion::new(Vec3::ZERO, Vec3::new(2.0, 0.2, 1.0), rotation).unwrap();

    // Along the box's long axis, rotated 45 degrees.
    assert!(region.contains(Vec3::new(0.6, 0.6, 0.0)));
    assert!(!region.contains(Vec3::new(0.6, -0.6, 0.0)));
    assert!(!region.contains(Vec3::new(0.0, 0.0, 0.6)));

    assert!(BoundingRegion::axis_aligned(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0)).is_err());
}

#[test]
fn test_depth_frame_must_match_table() {
    let rig = coincident_rig();
    let depth = DepthImage::new(4, 5, vec![1000; 20]).unwrap();
    let color = RgbImage::from_pixel(5, 5, Rgb([255, 255, 255]));
    let input = ProjectionInput {
        rig: &rig,
        depth: &depth,
        color: &color,
        timestamp: 0,
        frame_index: 0,
    };

    let err = CpuProjector::default().project(&input).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidDimensions(4, 5)));
}

/// Distorted, rotated, and offset cameras over a noisy depth frame.
fn realistic_frame() -> (CameraRig, DepthImage, RgbImage) {
    let depth_model = CameraModel::new(
        37,
        23,
        Intrinsics {
            fx: 30.0,
            fy: 30.0,
            cx: 18.0,
            cy: 11.0,
        },
        Distortion::from_coefficients(&[-0.05, 0.01, 0.001, -0.001]).unwrap(),
    );
    let color_model = CameraModel::new(
        40,
        30,
        Intrinsics {
            fx: 32.0,
            fy: 32.0,
            cx: 20.0,
            cy: 15.0,
        },
        Distortion::from_coefficients(&[0.02, -0.01, 0.0, 0.0, 0.001]).unwrap(),
    );
    let extrinsics = ExtrinsicTransform {
        rotation: Mat3::from_rotation_y(0.02),
        translation: Vec3::new(0.025, 0.0, 0.0),
    };
    let rig = CameraRig::new(depth_model, color_model, extrinsics);

    let samples = (0..37 * 23u32)
        .map(|i| {
            let v = (i.wrapping_mul(7919) + 13) % 3000;
            if v < 300 { 0 } else { 500 + v as u16 }
        })
        .collect();
    let depth = DepthImage::new(37, 23, samples).unwrap();
    let color = RgbImage::from_fn(40, 30, |x, y| {
        if (x + y) % 7 == 0 {
            Rgb([0, 0, 0])
        } else {
            Rgb([(x * 6) as u8, (y * 8) as u8, 100])
        }
    });
    (rig, depth, color)
}

#[test]
fn test_sequential_and_parallel_produce_same_points() {
    let (rig, depth, color) = realistic_frame();
    let input = ProjectionInput {
        rig: &rig,
        depth: &depth,
        color: &color,
        timestamp: 7,
        frame_index: 1,
    };
    let bounds = BoundingRegion::axis_aligned(Vec3::new(0.0, 0.0, 1.5), Vec3::ONE).unwrap();

    for rows_per_batch in [1, 3, 8, 100] {
        let config = ProjectionConfig::builder()
            .rows_per_batch(rows_per_batch)
            .bounds(Some(bounds))
            .build();
        let sequential = CpuProjector::new(config.clone()).project(&input).unwrap();
        let parallel = ParallelProjector::new(config).project(&input).unwrap();

        assert!(sequential.stats.accepted > 0);
        assert_eq!(sequential.stats, parallel.stats);
        assert_eq!(sorted(&sequential.points), sorted(&parallel.points));
        assert_eq!(parallel.timestamp, 7);
        assert_eq!(parallel.frame_index, 1);
    }
}

#[test]
fn test_stats_account_for_every_pixel() {
    let (rig, depth, color) = realistic_frame();
    let input = ProjectionInput {
        rig: &rig,
        depth: &depth,
        color: &color,
        timestamp: 0,
        frame_index: 0,
    };
    let buffer = ParallelProjector::default().project(&input).unwrap();
    let stats = buffer.stats;

    let rejected: usize = [
        Rejection::InvalidDepth,
        Rejection::BehindColorCamera,
        Rejection::OutOfColorImage,
        Rejection::BlackColor,
        Rejection::OutsideBounds,
    ]
    .iter()
    .map(|&r| stats.count(r))
    .sum();
    assert_eq!(stats.considered, 37 * 23);
    assert_eq!(stats.accepted, buffer.len());
    assert_eq!(stats.rejected(), rejected);
}

#[test]
fn test_projector_dispatch() {
    let (rig, depth, color) = realistic_frame();
    let input = ProjectionInput {
        rig: &rig,
        depth: &depth,
        color: &color,
        timestamp: 0,
        frame_index: 0,
    };

    let sequential = Projector::for_strategy(ProjectionStrategy::Sequential, ProjectionConfig::default()).unwrap();
    let parallel = Projector::for_strategy(ProjectionStrategy::Parallel, ProjectionConfig::default()).unwrap();
    assert_eq!(sequential.kind(), ProjectionStrategy::Sequential);
    assert_eq!(parallel.kind(), ProjectionStrategy::Parallel);

    let a = sequential.project(&input).unwrap();
    let b = parallel.project(&input).unwrap();
    assert_eq!(sorted(&a.points), sorted(&b.points));
}

#[cfg(not(jetson_cuda))]
#[test]
fn test_cuda_unavailable_off_jetson() {
    let result = Projector::for_strategy(ProjectionStrategy::Cuda, ProjectionConfig::default());
    assert!(matches!(result, Err(PipelineError::BackendUnavailable(_))));

    let probed = Projector::probe(ProjectionConfig::default());
    assert_ne!(probed.kind(), ProjectionStrategy::Cuda);
}

#[test]
fn test_config_builder_defaults() {
    let config = ProjectionConfig::builder().build();
    assert_eq!(config.black_threshold, 5);
    assert!(!config.flip_color_rows);
    assert!(config.bounds.is_none());
    assert!(!config.show_all_points);
    assert_eq!(config.rows_per_batch, 8);

    assert_eq!(ProjectionConfig::builder().rows_per_batch(0).build().rows_per_batch, 1);
}
