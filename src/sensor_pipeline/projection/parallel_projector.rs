use rayon::prelude::*;
use tracing::{debug, info_span, instrument};

use crate::sensor_pipeline::common::error::Result;
use crate::sensor_pipeline::projection::kernel::PixelKernel;
use crate::sensor_pipeline::projection::types::{
    PointBuffer, PointSample, ProjectionConfig, ProjectionInput, ProjectionStats,
};

/// Rayon fan-out over batches of depth rows.
///
/// Every batch fills its own point list and stats; the calling thread merges
/// them in row order once all batches have joined.
#[derive(Debug, Clone, Default)]
pub struct ParallelProjector {
    config: ProjectionConfig,
}

impl ParallelProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    #[instrument(name = "project_parallel", skip_all, fields(frame = input.frame_index))]
    pub fn project(&self, input: &ProjectionInput) -> Result<PointBuffer> {
        input.validate()?;
        let kernel = PixelKernel::new(input, &self.config);
        let depth = input.depth;
        let rows_per_batch = self.config.rows_per_batch.max(1);
        let batch_count = depth.height.div_ceil(rows_per_batch);

        let batches: Vec<(Vec<PointSample>, ProjectionStats)> = info_span!("fan_out", batch_count)
            .in_scope(|| {
                (0..batch_count)
                    .into_par_iter()
                    .map(|batch| {
                        let start = batch * rows_per_batch;
                        let end = (start + rows_per_batch).min(depth.height);
                        let mut points = Vec::with_capacity((end - start) * depth.width);
                        let mut stats = ProjectionStats::default();
                        kernel.project_rows(depth, start..end, &mut points, &mut stats);
                        (points, stats)
                    })
                    .collect()
            });

        let mut buffer = input.empty_buffer();
        let _merge = info_span!("merge").entered();
        buffer.points.reserve(batches.iter().map(|(points, _)| points.len()).sum());
        for (points, stats) in batches {
            buffer.points.extend(points);
            buffer.stats.merge(&stats);
        }

        debug!(accepted = buffer.stats.accepted, rejected = buffer.stats.rejected(), "Projected frame");
        Ok(buffer)
    }
}
