use glam::{Mat3, Vec3};

use crate::sensor_pipeline::common::error::{PipelineError, Result};

/// Rigid transform from depth-camera space to color-camera space (meters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrinsicTransform {
    pub rotation: Mat3,
    pub translation: Vec3,
}

impl Default for ExtrinsicTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ExtrinsicTransform {
    pub fn identity() -> Self {
        Self {
            rotation: Mat3::IDENTITY,
            translation: Vec3::ZERO,
        }
    }

    /// Builds from a row-major 3x3 rotation and a translation in meters.
    ///
    /// Rejects matrices that are not proper rotations.
    pub fn from_row_major(rotation: [f32; 9], translation: [f32; 3]) -> Result<Self> {
        // glam is column-major, so the row-major input is the transpose.
        let rotation = Mat3::from_cols_array(&rotation).transpose();
        let transform = Self {
            rotation,
            translation: Vec3::from_array(translation),
        };
        transform.validate()?;
        Ok(transform)
    }

    fn validate(&self) -> Result<()> {
        if !self.rotation.is_finite() || !self.translation.is_finite() {
            return Err(PipelineError::Calibration(
                "extrinsics contain non-finite values".to_string(),
            ));
        }
        let determinant = self.rotation.determinant();
        let orthogonality = (self.rotation * self.rotation.transpose() - Mat3::IDENTITY)
            .to_cols_array()
            .iter()
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        if (determinant - 1.0).abs() > 1e-3 || orthogonality > 1e-3 {
            return Err(PipelineError::Calibration(format!(
                "extrinsic rotation is not a proper rotation (det={:.4})",
                determinant
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Row-major rotation followed by translation, as uploaded to kernels.
    pub fn to_row_major(&self) -> [f32; 12] {
        let r = self.rotation.transpose().to_cols_array();
        let t = self.translation;
        [r[0], r[1], r[2], r[3], r[4], r[5], r[6], r[7], r[8], t.x, t.y, t.z]
    }
}
