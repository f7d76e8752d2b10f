use tracing::{info, warn};

use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::projection::cpu_projector::CpuProjector;
use crate::sensor_pipeline::projection::parallel_projector::ParallelProjector;
use crate::sensor_pipeline::projection::types::{PointBuffer, ProjectionConfig, ProjectionInput};
use crate::sensor_pipeline::projection::CudaProjector;

/// Closed set of projection strategies, chosen once at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionStrategy {
    Sequential,
    Parallel,
    Cuda,
}

impl std::fmt::Display for ProjectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProjectionStrategy::Sequential => "sequential",
            ProjectionStrategy::Parallel => "parallel",
            ProjectionStrategy::Cuda => "cuda",
        };
        f.pad(name)
    }
}

pub enum Projector {
    Sequential(CpuProjector),
    Parallel(ParallelProjector),
    Cuda(CudaProjector),
}

impl Projector {
    /// Builds the requested strategy. Fails only when CUDA is unavailable.
    pub fn for_strategy(strategy: ProjectionStrategy, config: ProjectionConfig) -> Result<Self> {
        let projector = match strategy {
            ProjectionStrategy::Sequential => Projector::Sequential(CpuProjector::new(config)),
            ProjectionStrategy::Parallel => Projector::Parallel(ParallelProjector::new(config)),
            ProjectionStrategy::Cuda => Projector::Cuda(
                CudaProjector::new(config)
                    .map_err(|e| PipelineError::BackendUnavailable(e.to_string()))?,
            ),
        };
        info!(strategy = %projector.kind(), "Projection strategy selected");
        Ok(projector)
    }

    /// Best strategy this machine supports.
    pub fn probe(config: ProjectionConfig) -> Self {
        match CudaProjector::new(config.clone()) {
            Ok(cuda) => {
                info!(strategy = "cuda", "Projection strategy selected");
                return Projector::Cuda(cuda);
            }
            Err(e) if cfg!(jetson_cuda) => warn!("CUDA projector unavailable: {}", e),
            Err(_) => {}
        }

        let threads = rayon::current_num_threads();
        let projector = if threads > 1 {
            Projector::Parallel(ParallelProjector::new(config))
        } else {
            Projector::Sequential(CpuProjector::new(config))
        };
        info!(strategy = %projector.kind(), threads, "Projection strategy selected");
        projector
    }

    pub fn kind(&self) -> ProjectionStrategy {
        match self {
            Projector::Sequential(_) => ProjectionStrategy::Sequential,
            Projector::Parallel(_) => ProjectionStrategy::Parallel,
            Projector::Cuda(_) => ProjectionStrategy::Cuda,
        }
    }

    pub fn config(&self) -> &ProjectionConfig {
        match self {
            Projector::Sequential(p) => p.config(),
            Projector::Parallel(p) => p.config(),
            Projector::Cuda(p) => p.config(),
        }
    }

    pub fn project(&self, input: &ProjectionInput) -> Result<PointBuffer> {
        match self {
            Projector::Sequential(p) => p.project(input),
            Projector::Parallel(p) => p.project(input),
            Projector::Cuda(p) => p
                .project(input)
                .map_err(|e| PipelineError::CudaError(format!("{:#}", e))),
        }
    }
}
