//! Recording directory layout:
//!
//! ```text
//! <root>/calibration.json
//! <root>/<serial>/depth.bin
//! <root>/<serial>/color.bin
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::sensor_pipeline::camera::CalibrationFile;
use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::session::types::StreamPairPaths;

pub const CALIBRATION_FILE: &str = "calibration.json";
pub const DEPTH_FILE: &str = "depth.bin";
pub const COLOR_FILE: &str = "color.bin";

#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
    calibration: CalibrationFile,
    cameras: Vec<StreamPairPaths>,
}

impl Dataset {
    /// Loads the calibration file and finds every camera directory, in serial order.
    ///
    /// Directories missing either recording are skipped with a warning.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn discover(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let calibration_path = root.join(CALIBRATION_FILE);
        if !calibration_path.is_file() {
            return Err(PipelineError::MissingStream(
                calibration_path.display().to_string(),
            ));
        }
        let calibration = CalibrationFile::load(&calibration_path)?;

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut cameras = Vec::new();
        for dir in dirs {
            let Some(serial) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let depth = dir.join(DEPTH_FILE);
            let color = dir.join(COLOR_FILE);
            if !depth.is_file() || !color.is_file() {
                warn!(serial, "Camera directory is missing a recording, skipping");
                continue;
            }
            cameras.push(StreamPairPaths::new(serial, depth, color));
        }

        if cameras.is_empty() {
            return Err(PipelineError::NoCamerasAvailable);
        }
        info!(cameras = cameras.len(), "Discovered dataset");

        Ok(Self {
            root: root.to_path_buf(),
            calibration,
            cameras,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn calibration(&self) -> &CalibrationFile {
        &self.calibration
    }

    pub fn cameras(&self) -> &[StreamPairPaths] {
        &self.cameras
    }

    pub fn camera(&self, serial: &str) -> Option<&StreamPairPaths> {
        self.cameras.iter().find(|c| c.serial == serial)
    }
}
