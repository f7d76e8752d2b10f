//! Camera calibration module
//!
//! Camera models, per-pixel undistortion tables, depth→color extrinsics, and
//! the external calibration file.

pub mod calibration;
pub mod extrinsics;
pub mod model;
mod rig;
mod undistortion;

#[cfg(test)]
mod tests;

pub use calibration::{CalibrationFile, CameraCalibration, RigidTransformEntry};
pub use extrinsics::ExtrinsicTransform;
pub use model::{CameraModel, DepthCalibration, Distortion, Intrinsics};
pub use rig::CameraRig;
pub use undistortion::UndistortionTable;
