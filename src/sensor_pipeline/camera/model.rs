//! Pinhole camera with rational radial + tangential distortion.

use tracing::debug;

use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::stream::SensorStreamHeader;

/// Damping applied to every fixed-point undistortion step.
pub const UNDISTORT_DAMPING: f64 = 0.9;
/// Iteration cap for the undistortion solve.
pub const UNDISTORT_MAX_ITERATIONS: usize = 20;
/// Squared normalized residual at which the solve stops early.
const UNDISTORT_CONVERGED: f64 = 1e-20;
/// Largest normalized residual still accepted after the last iteration.
const UNDISTORT_ACCEPTED: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// Distortion coefficients: k1..k6 rational radial, p1/p2 tangential.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
    pub p1: f64,
    pub p2: f64,
}

impl Distortion {
    /// Builds from a flat list in `k1, k2, p1, p2, k3, k4, k5, k6` order.
    ///
    /// Accepts 0, 4, 5 or 8 coefficients; anything else is an unsupported model.
    pub fn from_coefficients(coefficients: &[f32]) -> Result<Self> {
        if !matches!(coefficients.len(), 0 | 4 | 5 | 8) {
            return Err(PipelineError::UnsupportedDistortion(coefficients.len()));
        }
        let c = |i: usize| coefficients.get(i).copied().unwrap_or(0.0) as f64;
        Ok(Self {
            k1: c(0),
            k2: c(1),
            p1: c(2),
            p2: c(3),
            k3: c(4),
            k4: c(5),
            k5: c(6),
            k6: c(7),
        })
    }

    pub fn is_zero(&self) -> bool {
        *self == Distortion::default()
    }

    /// Forward model on normalized image coordinates.
    pub fn distort_normalized(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let numerator = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let denominator = 1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6;
        if denominator.abs() < f64::EPSILON {
            return (f64::NAN, f64::NAN);
        }
        let radial = numerator / denominator;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        (x * radial + x_tan, y * radial + y_tan)
    }
}

/// Raw depth correction: `metric = (raw + bias) * scale / units_per_meter`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthCalibration {
    pub scale: f32,
    pub bias: f32,
    pub units_per_meter: f32,
}

impl Default for DepthCalibration {
    fn default() -> Self {
        Self {
            scale: 1.0,
            bias: 0.0,
            units_per_meter: 1000.0,
        }
    }
}

impl DepthCalibration {
    /// Metric depth in meters, `None` for samples that carry no depth.
    ///
    /// A raw value of zero is always invalid, whatever the bias.
    #[inline]
    pub fn to_meters(&self, raw: u16) -> Option<f32> {
        if raw == 0 {
            return None;
        }
        let corrected = raw as f32 + self.bias;
        if corrected <= 0.0 {
            return None;
        }
        Some(corrected * self.scale / self.units_per_meter)
    }
}

/// Calibrated model of one physical sensor. Immutable after setup.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    pub width: u32,
    pub height: u32,
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
    pub depth: DepthCalibration,
}

impl CameraModel {
    pub fn new(width: u32, height: u32, intrinsics: Intrinsics, distortion: Distortion) -> Self {
        Self {
            width,
            height,
            intrinsics,
            distortion,
            depth: DepthCalibration::default(),
        }
    }

    /// Reads resolution, intrinsics, and distortion from a stream header.
    pub fn from_header(header: &SensorStreamHeader) -> Result<Self> {
        let calibration = &header.calibration;
        if calibration.len() < 4 {
            return Err(PipelineError::Calibration(format!(
                "calibration block has {} values, intrinsics need 4",
                calibration.len()
            )));
        }

        let intrinsics = Intrinsics {
            fx: calibration[0] as f64,
            fy: calibration[1] as f64,
            cx: calibration[2] as f64,
            cy: calibration[3] as f64,
        };
        if intrinsics.fx == 0.0 || intrinsics.fy == 0.0 {
            return Err(PipelineError::Calibration(
                "focal length must be non-zero".to_string(),
            ));
        }

        let distortion = Distortion::from_coefficients(&calibration[4..])?;
        debug!(
            width = header.width,
            height = header.height,
            ?intrinsics,
            distortion_terms = calibration.len() - 4,
            "Loaded camera model"
        );

        Ok(Self::new(header.width, header.height, intrinsics, distortion))
    }

    pub fn with_depth_calibration(mut self, depth: DepthCalibration) -> Self {
        self.depth = depth;
        self
    }

    /// Projects a normalized point `(x/z, y/z)` to a distorted pixel coordinate.
    pub fn distort(&self, normalized: [f64; 2]) -> [f64; 2] {
        let (xd, yd) = self
            .distortion
            .distort_normalized(normalized[0], normalized[1]);
        [
            self.intrinsics.fx * xd + self.intrinsics.cx,
            self.intrinsics.fy * yd + self.intrinsics.cy,
        ]
    }

    /// Normalized ray `(x, y)` (with implicit `z = 1`) seen at `pixel`.
    ///
    /// Damped fixed-point inversion of [`Distortion::distort_normalized`].
    /// Returns `None` when the iteration diverges.
    pub fn undistort(&self, pixel: [f64; 2]) -> Option<[f64; 2]> {
        let xd = (pixel[0] - self.intrinsics.cx) / self.intrinsics.fx;
        let yd = (pixel[1] - self.intrinsics.cy) / self.intrinsics.fy;
        if self.distortion.is_zero() {
            return Some([xd, yd]);
        }

        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_MAX_ITERATIONS {
            let (ex, ey) = self.distortion.distort_normalized(x, y);
            let (ex, ey) = (ex - xd, ey - yd);
            if !ex.is_finite() || !ey.is_finite() {
                return None;
            }
            if ex * ex + ey * ey < UNDISTORT_CONVERGED {
                return Some([x, y]);
            }
            x -= UNDISTORT_DAMPING * ex;
            y -= UNDISTORT_DAMPING * ey;
        }

        let (ex, ey) = self.distortion.distort_normalized(x, y);
        let residual = (ex - xd).hypot(ey - yd);
        (residual <= UNDISTORT_ACCEPTED).then_some([x, y])
    }
}
