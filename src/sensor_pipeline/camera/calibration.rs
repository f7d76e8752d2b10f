//! External calibration file: per-camera extrinsics and depth corrections.
//!
//! ```json
//! {
//!   "cameras": {
//!     "000123": {
//!       "depth_to_color": { "rotation": [1,0,0, 0,1,0, 0,0,1], "translation": [-0.032, 0, 0] },
//!       "depth_scale": 1.0,
//!       "depth_bias": -12.0,
//!       "world_pose": { "rotation": [1,0,0, 0,1,0, 0,0,1], "translation": [0, 1.2, 0] }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sensor_pipeline::camera::extrinsics::ExtrinsicTransform;
use crate::sensor_pipeline::camera::model::DepthCalibration;
use crate::sensor_pipeline::common::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransformEntry {
    /// Row-major 3x3 rotation
    pub rotation: [f32; 9],
    /// Translation in meters
    pub translation: [f32; 3],
}

impl RigidTransformEntry {
    pub fn to_transform(&self) -> Result<ExtrinsicTransform> {
        ExtrinsicTransform::from_row_major(self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    #[serde(default)]
    pub depth_to_color: Option<RigidTransformEntry>,
    #[serde(default)]
    pub depth_scale: Option<f32>,
    #[serde(default)]
    pub depth_bias: Option<f32>,
    #[serde(default)]
    pub depth_units_per_meter: Option<f32>,
    /// Camera pose in the shared scene frame, passed through to the renderer
    #[serde(default)]
    pub world_pose: Option<RigidTransformEntry>,
}

impl CameraCalibration {
    /// Depth→color transform; a camera without one cannot be projected.
    pub fn depth_to_color(&self, serial: &str) -> Result<ExtrinsicTransform> {
        self.depth_to_color
            .as_ref()
            .ok_or_else(|| PipelineError::MissingExtrinsics(serial.to_string()))?
            .to_transform()
    }

    pub fn world_pose(&self) -> Result<Option<ExtrinsicTransform>> {
        self.world_pose.as_ref().map(|p| p.to_transform()).transpose()
    }

    /// Applies the file's overrides on top of `base`.
    pub fn depth_calibration(&self, base: DepthCalibration) -> Result<DepthCalibration> {
        let depth = DepthCalibration {
            scale: self.depth_scale.unwrap_or(base.scale),
            bias: self.depth_bias.unwrap_or(base.bias),
            units_per_meter: self.depth_units_per_meter.unwrap_or(base.units_per_meter),
        };
        if !(depth.scale.is_finite() && depth.scale > 0.0) {
            return Err(PipelineError::Calibration(format!(
                "depth scale must be positive, got {}",
                depth.scale
            )));
        }
        if !(depth.units_per_meter.is_finite() && depth.units_per_meter > 0.0) {
            return Err(PipelineError::Calibration(format!(
                "depth units per meter must be positive, got {}",
                depth.units_per_meter
            )));
        }
        if !depth.bias.is_finite() {
            return Err(PipelineError::Calibration("depth bias is not finite".to_string()));
        }
        Ok(depth)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub cameras: BTreeMap<String, CameraCalibration>,
}

impl CalibrationFile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let file = Self::from_json(&json)?;
        debug!(path = %path.display(), cameras = file.cameras.len(), "Loaded calibration file");
        Ok(file)
    }

    /// Entry for `serial`; a missing entry means no extrinsics.
    pub fn camera(&self, serial: &str) -> Result<&CameraCalibration> {
        self.cameras
            .get(serial)
            .ok_or_else(|| PipelineError::MissingExtrinsics(serial.to_string()))
    }
}
