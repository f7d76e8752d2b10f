//! Types shared by every projection strategy

use glam::{Affine3A, Quat, Vec3};
use image::RgbImage;

use crate::sensor_pipeline::camera::CameraRig;
use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::stream::DepthImage;

/// One colored point in the depth camera's frame (meters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSample {
    pub position: Vec3,
    /// RGBA, alpha always 255
    pub color: [u8; 4],
}

/// Why a depth pixel produced no point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    InvalidDepth,
    BehindColorCamera,
    OutOfColorImage,
    BlackColor,
    OutsideBounds,
}

/// Per-reason counts for one projected frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    pub considered: usize,
    pub accepted: usize,
    pub invalid_depth: usize,
    pub behind_color_camera: usize,
    pub out_of_color_image: usize,
    pub black_color: usize,
    pub outside_bounds: usize,
}

impl ProjectionStats {
    /// Counts one considered pixel; `None` means it was accepted.
    #[inline]
    pub fn record(&mut self, rejection: Option<Rejection>) {
        self.considered += 1;
        match rejection {
            None => self.accepted += 1,
            Some(reason) => self.reject(reason),
        }
    }

    #[inline]
    fn reject(&mut self, reason: Rejection) {
        match reason {
            Rejection::InvalidDepth => self.invalid_depth += 1,
            Rejection::BehindColorCamera => self.behind_color_camera += 1,
            Rejection::OutOfColorImage => self.out_of_color_image += 1,
            Rejection::BlackColor => self.black_color += 1,
            Rejection::OutsideBounds => self.outside_bounds += 1,
        }
    }

    pub fn count(&self, reason: Rejection) -> usize {
        match reason {
            Rejection::InvalidDepth => self.invalid_depth,
            Rejection::BehindColorCamera => self.behind_color_camera,
            Rejection::OutOfColorImage => self.out_of_color_image,
            Rejection::BlackColor => self.black_color,
            Rejection::OutsideBounds => self.outside_bounds,
        }
    }

    pub fn rejected(&self) -> usize {
        self.considered - self.accepted
    }

    pub fn merge(&mut self, other: &ProjectionStats) {
        self.considered += other.considered;
        self.accepted += other.accepted;
        self.invalid_depth += other.invalid_depth;
        self.behind_color_camera += other.behind_color_camera;
        self.out_of_color_image += other.out_of_color_image;
        self.black_color += other.black_color;
        self.outside_bounds += other.outside_bounds;
    }
}

/// Points of one synchronized frame. Replaced wholesale on every projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBuffer {
    pub points: Vec<PointSample>,
    /// Depth timestamp of the frame (ns)
    pub timestamp: u64,
    /// Synchronized pair index of the frame
    pub frame_index: u64,
    pub stats: ProjectionStats,
}

impl PointBuffer {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Oriented box that culls points, tested in its own normalized frame where
/// the box spans `[-0.5, 0.5]` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRegion {
    world_to_local: Affine3A,
}

impl BoundingRegion {
    /// Box with the given center, edge lengths, and orientation.
    pub fn new(center: Vec3, size: Vec3, rotation: Quat) -> Result<Self> {
        if size.min_element() <= 0.0 || !size.is_finite() {
            return Err(PipelineError::Calibration(format!(
                "bounding region size must be positive, got {}",
                size
            )));
        }
        let local_to_world = Affine3A::from_scale_rotation_translation(size, rotation, center);
        Ok(Self {
            world_to_local: local_to_world.inverse(),
        })
    }

    /// Axis-aligned box centered at `center`.
    pub fn axis_aligned(center: Vec3, size: Vec3) -> Result<Self> {
        Self::new(center, size, Quat::IDENTITY)
    }

    /// Uses a caller-supplied world→normalized-local transform as is.
    pub fn from_world_to_local(world_to_local: Affine3A) -> Self {
        Self { world_to_local }
    }

    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.world_to_local.transform_point3(point)
    }

    #[inline]
    pub fn contains(&self, point: Vec3) -> bool {
        let local = self.to_local(point);
        local.abs().max_element() <= 0.5
    }

    /// Row-major 3x4 world→local matrix, as uploaded to kernels.
    pub fn to_row_major(&self) -> [f32; 12] {
        let m = self.world_to_local.matrix3;
        let t = self.world_to_local.translation;
        [
            m.x_axis.x, m.y_axis.x, m.z_axis.x, t.x,
            m.x_axis.y, m.y_axis.y, m.z_axis.y, t.y,
            m.x_axis.z, m.y_axis.z, m.z_axis.z, t.z,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Colors with `max(r, g, b) <= black_threshold` are treated as no data
    pub black_threshold: u8,
    /// Sample the color image bottom-up
    pub flip_color_rows: bool,
    pub bounds: Option<BoundingRegion>,
    /// Skip bounds culling
    pub show_all_points: bool,
    /// Rows handed to one parallel task
    pub rows_per_batch: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            black_threshold: 5,
            flip_color_rows: false,
            bounds: None,
            show_all_points: false,
            rows_per_batch: 8,
        }
    }
}

impl ProjectionConfig {
    pub fn builder() -> ProjectionConfigBuilder {
        ProjectionConfigBuilder::default()
    }

    /// Bounds that actually apply, if culling is on.
    pub fn active_bounds(&self) -> Option<&BoundingRegion> {
        if self.show_all_points {
            None
        } else {
            self.bounds.as_ref()
        }
    }
}

#[derive(Default)]
pub struct ProjectionConfigBuilder {
    black_threshold: Option<u8>,
    flip_color_rows: Option<bool>,
    bounds: Option<Option<BoundingRegion>>,
    show_all_points: Option<bool>,
    rows_per_batch: Option<usize>,
}

impl ProjectionConfigBuilder {
    pub fn black_threshold(mut self, threshold: u8) -> Self {
        self.black_threshold = Some(threshold);
        self
    }

    pub fn flip_color_rows(mut self, flip: bool) -> Self {
        self.flip_color_rows = Some(flip);
        self
    }

    pub fn bounds(mut self, bounds: Option<BoundingRegion>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn show_all_points(mut self, show_all: bool) -> Self {
        self.show_all_points = Some(show_all);
        self
    }

    pub fn rows_per_batch(mut self, rows: usize) -> Self {
        self.rows_per_batch = Some(rows.max(1));
        self
    }

    pub fn build(self) -> ProjectionConfig {
        let default = ProjectionConfig::default();
        ProjectionConfig {
            black_threshold: self.black_threshold.unwrap_or(default.black_threshold),
            flip_color_rows: self.flip_color_rows.unwrap_or(default.flip_color_rows),
            bounds: self.bounds.unwrap_or(default.bounds),
            show_all_points: self.show_all_points.unwrap_or(default.show_all_points),
            rows_per_batch: self.rows_per_batch.unwrap_or(default.rows_per_batch),
        }
    }
}

/// One synchronized frame plus the camera setup needed to project it.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionInput<'a> {
    pub rig: &'a CameraRig,
    pub depth: &'a DepthImage,
    pub color: &'a RgbImage,
    pub timestamp: u64,
    pub frame_index: u64,
}

impl<'a> ProjectionInput<'a> {
    /// Depth frame must match the rig's undistortion table.
    pub fn validate(&self) -> Result<()> {
        let table = self.rig.table();
        if self.depth.width != table.width() || self.depth.height != table.height() {
            return Err(PipelineError::InvalidDimensions(
                self.depth.width,
                self.depth.height,
            ));
        }
        if self.color.width() == 0 || self.color.height() == 0 {
            return Err(PipelineError::InvalidDimensions(
                self.color.width() as usize,
                self.color.height() as usize,
            ));
        }
        Ok(())
    }

    pub(crate) fn empty_buffer(&self) -> PointBuffer {
        PointBuffer {
            points: Vec::new(),
            timestamp: self.timestamp,
            frame_index: self.frame_index,
            stats: ProjectionStats::default(),
        }
    }
}
