//! Stream synchronization module
//!
//! Time alignment of depth/color record pairs for one camera, and leader
//! tracking across cameras.

mod arbiter;
mod synchronizer;
mod tolerance;


pub use arbiter::MultiCameraArbiter;
pub use synchronizer::{FrameIndexStrategy, StreamSynchronizer, SyncedFramePair};
pub use tolerance::{
    DEFAULT_PERIOD_FRACTION, FALLBACK_TOLERANCE_NS, SyncTolerance, is_synchronized,
};
