//! RGB-D sensor pipeline module
//!
//! Reads recorded depth and color streams, pairs their records in time, and
//! projects each synchronized pair into a colored point cloud.

pub mod camera;
pub mod common;
pub mod projection;
pub mod session;
pub mod stream;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use common::{PipelineError, PipelineTimings, Result};

pub use camera::{CalibrationFile, CameraModel, CameraRig, ExtrinsicTransform, UndistortionTable};

pub use stream::{BinaryStreamReader, SensorRecord, SensorStreamHeader, SensorStreamReader};

pub use sync::{FrameIndexStrategy, MultiCameraArbiter, StreamSynchronizer, SyncTolerance};

pub use projection::{
    BoundingRegion, PointBuffer, PointSample, ProjectionConfig, ProjectionStrategy, Projector,
};

pub use session::{
    Dataset, FrameSource, MultiCameraPlayback, SessionConfig, StrategyPreference,
    StreamPairHandle, open_stream_pair,
};
