use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::sensor_pipeline::camera::model::CameraModel;

/// Per-pixel normalized rays of one camera, built once and shared read-only.
///
/// Pixels whose undistortion did not converge hold NaN and are reported as
/// `None` by [`UndistortionTable::ray`].
#[derive(Debug, Clone)]
pub struct UndistortionTable {
    width: usize,
    height: usize,
    rays: Vec<[f32; 2]>,
}

impl UndistortionTable {
    #[instrument(skip(model), fields(width = model.width, height = model.height))]
    pub fn build(model: &CameraModel) -> Self {
        let width = model.width as usize;
        let height = model.height as usize;
        let mut rays = vec![[f32::NAN; 2]; width * height];

        // A zero-width model has no rows to fill.
        rays.par_chunks_mut(width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                for (x, ray) in row.iter_mut().enumerate() {
                    if let Some([rx, ry]) = model.undistort([x as f64, y as f64]) {
                        *ray = [rx as f32, ry as f32];
                    }
                }
            });

        let table = Self {
            width,
            height,
            rays,
        };
        debug!(invalid = table.invalid_count(), "Built undistortion table");
        table
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major rays, NaN where invalid.
    pub fn rays(&self) -> &[[f32; 2]] {
        &self.rays
    }

    #[inline]
    pub fn ray(&self, x: usize, y: usize) -> Option<[f32; 2]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let ray = self.rays[y * self.width + x];
        if ray[0].is_nan() || ray[1].is_nan() {
            None
        } else {
            Some(ray)
        }
    }

    pub fn invalid_count(&self) -> usize {
        self.rays.iter().filter(|r| r[0].is_nan()).count()
    }
}
