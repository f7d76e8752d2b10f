//! Point cloud projection module
//!
//! Turns a synchronized depth/color frame into colored 3D points. Every
//! strategy runs the same per-pixel kernel; sequential and parallel output
//! hold the same points, only their order may differ.

#[cfg(jetson_cuda)]
pub mod cuda_projector;
pub mod cpu_projector;
pub mod kernel;
pub mod parallel_projector;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod tests;

// Stub when NOT on Jetson
#[cfg(not(jetson_cuda))]
pub struct CudaProjector {
    config: ProjectionConfig,
}

#[cfg(not(jetson_cuda))]
impl CudaProjector {
    pub fn new(_config: ProjectionConfig) -> anyhow::Result<Self> {
        anyhow::bail!("CUDA projection is not available on this platform")
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub fn project(&self, _input: &ProjectionInput) -> anyhow::Result<PointBuffer> {
        anyhow::bail!("CUDA projection is not available on this platform")
    }
}

#[cfg(jetson_cuda)]
pub use cuda_projector::CudaProjector;
pub use cpu_projector::CpuProjector;
pub use kernel::PixelKernel;
pub use parallel_projector::ParallelProjector;
pub use strategy::{ProjectionStrategy, Projector};
pub use types::{
    BoundingRegion, PointBuffer, PointSample, ProjectionConfig, ProjectionConfigBuilder,
    ProjectionInput, ProjectionStats, Rejection,
};
