//! Common utilities module
//!
//! This module contains shared utilities used across the sensor pipeline.

pub mod error;
pub mod timing;

pub use error::{PipelineError, Result};
pub use timing::{PipelineTimings, StepTiming, Timer};
