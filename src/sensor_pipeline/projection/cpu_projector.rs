use tracing::{debug, instrument};

use crate::sensor_pipeline::common::error::Result;
use crate::sensor_pipeline::projection::kernel::PixelKernel;
use crate::sensor_pipeline::projection::types::{PointBuffer, ProjectionConfig, ProjectionInput};

/// Single-threaded row-major projection.
#[derive(Debug, Clone, Default)]
pub struct CpuProjector {
    config: ProjectionConfig,
}

impl CpuProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    #[instrument(name = "project_sequential", skip_all, fields(frame = input.frame_index))]
    pub fn project(&self, input: &ProjectionInput) -> Result<PointBuffer> {
        input.validate()?;
        let kernel = PixelKernel::new(input, &self.config);

        let mut buffer = input.empty_buffer();
        buffer.points.reserve(input.depth.samples.len() / 2);
        kernel.project_rows(input.depth, 0..input.depth.height, &mut buffer.points, &mut buffer.stats);

        debug!(accepted = buffer.stats.accepted, rejected = buffer.stats.rejected(), "Projected frame");
        Ok(buffer)
    }
}
