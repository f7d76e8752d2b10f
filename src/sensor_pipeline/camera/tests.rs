use glam::Vec3;

use crate::sensor_pipeline::camera::{
    CalibrationFile, CameraModel, DepthCalibration, Distortion, ExtrinsicTransform, Intrinsics,
    UndistortionTable,
};
use crate::sensor_pipeline::common::error::PipelineError;
use crate::sensor_pipeline::stream::SensorStreamHeader;

fn intrinsics() -> Intrinsics {
    Intrinsics {
        fx: 500.0,
        fy: 500.0,
        cx: 320.0,
        cy: 240.0,
    }
}

fn distorted_model() -> CameraModel {
    let distortion = Distortion::from_coefficients(&[
        -0.12, 0.03, 0.0008, -0.0005, 0.002, 0.05, -0.01, 0.001,
    ])
    .unwrap();
    CameraModel::new(640, 480, intrinsics(), distortion)
}

#[test]
fn test_undistort_distort_round_trip_on_grid() {
    let model = distorted_model();

    for y in (0..480).step_by(40) {
        for x in (0..640).step_by(40) {
            let pixel = [x as f64, y as f64];
            let ray = model.undistort(pixel).expect("undistortion converges");
            let back = model.distort(ray);
            assert!(
                (back[0] - pixel[0]).abs() < 0.5 && (back[1] - pixel[1]).abs() < 0.5,
                "pixel {:?} came back as {:?}",
                pixel,
                back
            );
        }
    }
}

#[test]
fn test_zero_distortion_is_pinhole() {
    let model = CameraModel::new(640, 480, intrinsics(), Distortion::default());
    let ray = model.undistort([420.0, 140.0]).unwrap();
    assert!((ray[0] - 0.2).abs() < 1e-12);
    assert!((ray[1] + 0.2).abs() < 1e-12);
    assert_eq!(model.distort(ray), [420.0, 140.0]);
}

#[test]
fn test_distortion_coefficient_order() {
    let d = Distortion::from_coefficients(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    assert_eq!((d.k1, d.k2, d.p1, d.p2, d.k3), (1.0, 2.0, 3.0, 4.0, 5.0));
    assert_eq!((d.k4, d.k5, d.k6), (0.0, 0.0, 0.0));
}

#[test]
fn test_unsupported_distortion_size_is_rejected() {
    for len in [1, 2, 3, 6, 7, 9] {
        let coefficients = vec![0.0f32; len];
        assert!(matches!(
            Distortion::from_coefficients(&coefficients),
            Err(PipelineError::UnsupportedDistortion(n)) if n == len
        ));
    }
}

#[test]
fn test_model_from_header() {
    let header = SensorStreamHeader::depth(
        640,
        480,
        30.0,
        vec![500.0, 510.0, 320.0, 240.0, -0.1, 0.01, 0.0, 0.0],
    )
    .unwrap();
    let model = CameraModel::from_header(&header).unwrap();
    assert_eq!((model.width, model.height), (640, 480));
    assert_eq!(model.intrinsics.fy, 510.0);
    assert!((model.distortion.k1 + 0.1).abs() < 1e-7);

    let short = SensorStreamHeader::depth(640, 480, 30.0, vec![500.0, 500.0]).unwrap();
    assert!(matches!(
        CameraModel::from_header(&short),
        Err(PipelineError::Calibration(_))
    ));
}

#[test]
fn test_depth_calibration_formula() {
    let depth = DepthCalibration::default();
    assert_eq!(depth.to_meters(2000), Some(2.0));

    let corrected = DepthCalibration {
        scale: 1.02,
        bias: -100.0,
        units_per_meter: 1000.0,
    };
    let meters = corrected.to_meters(1100).unwrap();
    assert!((meters - 1.02).abs() < 1e-6);
}

#[test]
fn test_zero_depth_is_rejected_regardless_of_bias() {
    for bias in [-50.0, 0.0, 50.0, 5000.0] {
        let depth = DepthCalibration {
            scale: 3.0,
            bias,
            units_per_meter: 1000.0,
        };
        assert_eq!(depth.to_meters(0), None);
    }

    let negative = DepthCalibration {
        bias: -500.0,
        ..DepthCalibration::default()
    };
    assert_eq!(negative.to_meters(500), None);
    assert_eq!(negative.to_meters(400), None);
}

#[test]
fn test_table_matches_model() {
    let model = distorted_model();
    let table = UndistortionTable::build(&model);
    assert_eq!((table.width(), table.height()), (640, 480));
    assert_eq!(table.invalid_count(), 0);

    for (x, y) in [(0, 0), (320, 240), (639, 479), (100, 400)] {
        let expected = model.undistort([x as f64, y as f64]).unwrap();
        let ray = table.ray(x, y).unwrap();
        assert!((ray[0] as f64 - expected[0]).abs() < 1e-6);
        assert!((ray[1] as f64 - expected[1]).abs() < 1e-6);
    }

    assert!(table.ray(640, 0).is_none());
    assert!(table.ray(0, 480).is_none());
}

#[test]
fn test_center_pixel_ray_is_optical_axis() {
    let model = CameraModel::new(640, 480, intrinsics(), Distortion::default());
    let table = UndistortionTable::build(&model);
    assert_eq!(table.ray(320, 240), Some([0.0, 0.0]));
}

#[test]
fn test_empty_model_builds_empty_table() {
    for (width, height) in [(0, 480), (640, 0), (0, 0)] {
        let model = CameraModel::new(width, height, intrinsics(), Distortion::default());
        let table = UndistortionTable::build(&model);
        assert!(table.rays().is_empty());
        assert_eq!(table.invalid_count(), 0);
        assert_eq!(table.ray(0, 0), None);
    }
}

#[test]
fn test_extrinsics_row_major_and_inverse() {
    // 90 degrees about z: x -> y, y -> -x.
    let transform = ExtrinsicTransform::from_row_major(
        [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        [0.1, 0.0, 0.0],
    )
    .unwrap();

    let moved = transform.apply(Vec3::new(1.0, 0.0, 2.0));
    assert!((moved - Vec3::new(0.1, 1.0, 2.0)).length() < 1e-6);

    let back = transform.inverse().apply(moved);
    assert!((back - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-6);

    let row_major = transform.to_row_major();
    assert_eq!(&row_major[..3], &[0.0, -1.0, 0.0]);
    assert_eq!(&row_major[9..], &[0.1, 0.0, 0.0]);
}

#[test]
fn test_extrinsics_reject_non_rotation() {
    let result = ExtrinsicTransform::from_row_major(
        [2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        [0.0, 0.0, 0.0],
    );
    assert!(matches!(result, Err(PipelineError::Calibration(_))));
}

#[test]
fn test_calibration_file_overrides() {
    let json = r#"{
        "cameras": {
            "cam0": {
                "depth_to_color": {
                    "rotation": [1, 0, 0, 0, 1, 0, 0, 0, 1],
                    "translation": [-0.032, 0.0, 0.004]
                },
                "depth_bias": -12.0,
                "world_pose": {
                    "rotation": [1, 0, 0, 0, 1, 0, 0, 0, 1],
                    "translation": [0.0, 1.2, 0.0]
                }
            },
            "cam1": { "depth_scale": 1.01 }
        }
    }"#;
    let file = CalibrationFile::from_json(json).unwrap();

    let cam0 = file.camera("cam0").unwrap();
    let extrinsics = cam0.depth_to_color("cam0").unwrap();
    assert!((extrinsics.translation.x + 0.032).abs() < 1e-7);
    let depth = cam0.depth_calibration(DepthCalibration::default()).unwrap();
    assert_eq!(depth.bias, -12.0);
    assert_eq!(depth.scale, 1.0);
    assert_eq!(
        cam0.world_pose().unwrap().unwrap().translation,
        Vec3::new(0.0, 1.2, 0.0)
    );

    let cam1 = file.camera("cam1").unwrap();
    assert!(matches!(
        cam1.depth_to_color("cam1"),
        Err(PipelineError::MissingExtrinsics(s)) if s == "cam1"
    ));
    assert!(matches!(
        file.camera("cam2"),
        Err(PipelineError::MissingExtrinsics(_))
    ));
}

#[test]
fn test_calibration_rejects_bad_depth_scale() {
    let file = CalibrationFile::from_json(r#"{ "cameras": { "c": { "depth_scale": 0.0 } } }"#).unwrap();
    let result = file
        .camera("c")
        .unwrap()
        .depth_calibration(DepthCalibration::default());
    assert!(matches!(result, Err(PipelineError::Calibration(_))));
}

#[test]
fn test_malformed_calibration_json() {
    assert!(matches!(
        CalibrationFile::from_json("{ not json"),
        Err(PipelineError::CalibrationParse(_))
    ));
}
