//! Collaborator surface module
//!
//! Explicit handles over one camera's recordings, dataset discovery, and
//! multi-camera playback. Nothing here is global: every handle owns its
//! readers, models, and projector.

mod dataset;
mod handle;
mod playback;
mod types;


pub use dataset::{CALIBRATION_FILE, COLOR_FILE, DEPTH_FILE, Dataset};
pub use handle::{FileStreamReader, FrameSource, StreamPairHandle, open_stream_pair};
pub use playback::MultiCameraPlayback;
pub use types::{SessionConfig, SessionConfigBuilder, StrategyPreference, StreamPairPaths};
