use std::path::PathBuf;

use crate::sensor_pipeline::common::error::Result;
use crate::sensor_pipeline::projection::{ProjectionConfig, ProjectionStrategy, Projector};
use crate::sensor_pipeline::stream::ColorDecoding;
use crate::sensor_pipeline::sync::{FrameIndexStrategy, SyncTolerance};

/// Which projection strategy a session should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyPreference {
    /// Probe the machine and take the best available
    #[default]
    Auto,
    Fixed(ProjectionStrategy),
}

/// Locations of one camera's depth and color recordings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPairPaths {
    pub serial: String,
    pub depth: PathBuf,
    pub color: PathBuf,
}

impl StreamPairPaths {
    pub fn new(serial: impl Into<String>, depth: impl Into<PathBuf>, color: impl Into<PathBuf>) -> Self {
        Self {
            serial: serial.into(),
            depth: depth.into(),
            color: color.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub tolerance: SyncTolerance,
    pub frame_index_strategy: FrameIndexStrategy,
    pub strategy: StrategyPreference,
    /// Keep color payloads compressed until a frame is projected
    pub color_decoding: ColorDecoding,
    pub projection: ProjectionConfig,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    pub fn build_projector(&self) -> Result<Projector> {
        match self.strategy {
            StrategyPreference::Auto => Ok(Projector::probe(self.projection.clone())),
            StrategyPreference::Fixed(strategy) => {
                Projector::for_strategy(strategy, self.projection.clone())
            }
        }
    }
}

#[derive(Default)]
pub struct SessionConfigBuilder {
    tolerance: Option<SyncTolerance>,
    frame_index_strategy: Option<FrameIndexStrategy>,
    strategy: Option<StrategyPreference>,
    color_decoding: Option<ColorDecoding>,
    projection: Option<ProjectionConfig>,
}

impl SessionConfigBuilder {
    pub fn tolerance(mut self, tolerance: SyncTolerance) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn frame_index_strategy(mut self, strategy: FrameIndexStrategy) -> Self {
        self.frame_index_strategy = Some(strategy);
        self
    }

    pub fn strategy(mut self, strategy: StrategyPreference) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn defer_color_decode(mut self, defer: bool) -> Self {
        self.color_decoding = Some(if defer {
            ColorDecoding::Defer
        } else {
            ColorDecoding::Decode
        });
        self
    }

    pub fn projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn build(self) -> SessionConfig {
        let default = SessionConfig::default();
        SessionConfig {
            tolerance: self.tolerance.unwrap_or(default.tolerance),
            frame_index_strategy: self
                .frame_index_strategy
                .unwrap_or(default.frame_index_strategy),
            strategy: self.strategy.unwrap_or(default.strategy),
            color_decoding: self.color_decoding.unwrap_or(default.color_decoding),
            projection: self.projection.unwrap_or(default.projection),
        }
    }
}
