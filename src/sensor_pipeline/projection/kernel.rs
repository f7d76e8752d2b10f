//! Per-pixel projection shared by the CPU strategies.
//!
//! `src/cuda/kernels/project_depth.cu` mirrors these steps one thread per pixel.

use std::ops::Range;

use glam::Vec3;
use image::RgbImage;

use crate::sensor_pipeline::camera::{CameraModel, DepthCalibration, ExtrinsicTransform, UndistortionTable};
use crate::sensor_pipeline::projection::types::{
    BoundingRegion, PointSample, ProjectionConfig, ProjectionInput, ProjectionStats, Rejection,
};
use crate::sensor_pipeline::stream::DepthImage;

/// Everything one pixel needs, borrowed from a single frame's input.
#[derive(Debug, Clone, Copy)]
pub struct PixelKernel<'a> {
    depth_calibration: DepthCalibration,
    table: &'a UndistortionTable,
    color_model: &'a CameraModel,
    extrinsics: ExtrinsicTransform,
    color: &'a RgbImage,
    black_threshold: u8,
    flip_color_rows: bool,
    bounds: Option<BoundingRegion>,
}

impl<'a> PixelKernel<'a> {
    pub fn new(input: &ProjectionInput<'a>, config: &ProjectionConfig) -> Self {
        Self {
            depth_calibration: input.rig.depth_model.depth,
            table: input.rig.table(),
            color_model: &input.rig.color_model,
            extrinsics: input.rig.extrinsics,
            color: input.color,
            black_threshold: config.black_threshold,
            flip_color_rows: config.flip_color_rows,
            bounds: config.active_bounds().copied(),
        }
    }

    /// Projects depth pixel `(x, y)` with raw sample `raw`.
    #[inline]
    pub fn project_pixel(&self, x: usize, y: usize, raw: u16) -> Result<PointSample, Rejection> {
        let metric = self
            .depth_calibration
            .to_meters(raw)
            .ok_or(Rejection::InvalidDepth)?;
        let [rx, ry] = self.table.ray(x, y).ok_or(Rejection::InvalidDepth)?;
        let position = Vec3::new(rx * metric, ry * metric, metric);

        let in_color = self.extrinsics.apply(position);
        if in_color.z <= 0.0 {
            return Err(Rejection::BehindColorCamera);
        }

        let [u, v] = self.color_model.distort([
            (in_color.x / in_color.z) as f64,
            (in_color.y / in_color.z) as f64,
        ]);
        let (width, height) = self.color.dimensions();
        let (u, v) = (u.round(), v.round());
        if !(u >= 0.0 && v >= 0.0 && u < width as f64 && v < height as f64) {
            return Err(Rejection::OutOfColorImage);
        }
        let (u, mut v) = (u as u32, v as u32);
        if self.flip_color_rows {
            v = height - 1 - v;
        }

        let [r, g, b] = self.color.get_pixel(u, v).0;
        if r.max(g).max(b) <= self.black_threshold {
            return Err(Rejection::BlackColor);
        }

        if let Some(bounds) = &self.bounds {
            if !bounds.contains(position) {
                return Err(Rejection::OutsideBounds);
            }
        }

        Ok(PointSample {
            position,
            color: [r, g, b, 255],
        })
    }

    /// Projects whole rows in row-major order, appending accepted points.
    pub fn project_rows(
        &self,
        depth: &DepthImage,
        rows: Range<usize>,
        points: &mut Vec<PointSample>,
        stats: &mut ProjectionStats,
    ) {
        for y in rows {
            let row = &depth.samples[y * depth.width..(y + 1) * depth.width];
            for (x, &raw) in row.iter().enumerate() {
                match self.project_pixel(x, y, raw) {
                    Ok(point) => {
                        points.push(point);
                        stats.record(None);
                    }
                    Err(reason) => stats.record(Some(reason)),
                }
            }
        }
    }
}
