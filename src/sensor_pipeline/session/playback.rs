use tracing::{debug, info, instrument, warn};

use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::session::dataset::Dataset;
use crate::sensor_pipeline::session::handle::{FrameSource, StreamPairHandle, open_stream_pair};
use crate::sensor_pipeline::session::types::SessionConfig;
use crate::sensor_pipeline::sync::MultiCameraArbiter;

/// Steps every camera of a dataset together, led by the camera furthest ahead.
pub struct MultiCameraPlayback {
    cameras: Vec<StreamPairHandle>,
    arbiter: MultiCameraArbiter,
    started: bool,
}

impl MultiCameraPlayback {
    /// Opens every camera; cameras that fail setup are logged and left out.
    #[instrument(skip_all, fields(root = %dataset.root().display()))]
    pub fn open(dataset: &Dataset, config: &SessionConfig) -> Result<Self> {
        let mut cameras = Vec::with_capacity(dataset.cameras().len());
        for paths in dataset.cameras() {
            match open_stream_pair(paths, dataset.calibration(), config) {
                Ok(handle) => cameras.push(handle),
                Err(e) => warn!(serial = %paths.serial, "Camera setup failed, skipping: {}", e),
            }
        }
        info!(
            opened = cameras.len(),
            discovered = dataset.cameras().len(),
            "Opened multi-camera playback"
        );
        Self::from_handles(cameras)
    }

    pub fn from_handles(cameras: Vec<StreamPairHandle>) -> Result<Self> {
        if cameras.is_empty() {
            return Err(PipelineError::NoCamerasAvailable);
        }
        Ok(Self {
            arbiter: MultiCameraArbiter::new(cameras.len()),
            cameras,
            started: false,
        })
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn cameras(&self) -> &[StreamPairHandle] {
        &self.cameras
    }

    pub fn camera_mut(&mut self, index: usize) -> Option<&mut StreamPairHandle> {
        self.cameras.get_mut(index)
    }

    pub fn leading_camera(&self) -> Option<usize> {
        self.arbiter.leading_camera()
    }

    /// Advances the rig by one leader frame. Returns the leader's new timestamp,
    /// or `None` once the leading camera has run out of frames.
    pub fn step(&mut self) -> Result<Option<u64>> {
        if !self.started {
            self.started = true;
            for (index, camera) in self.cameras.iter_mut().enumerate() {
                if let Some(ts) = camera.next_frame()? {
                    self.arbiter.record(index, ts);
                }
            }
            let leader = self.arbiter.recompute();
            return Ok(leader.and_then(|l| self.arbiter.last_timestamp(l)));
        }

        let Some(leader) = self.arbiter.leading_camera() else {
            return Ok(None);
        };
        let Some(target) = self.cameras[leader].next_frame()? else {
            debug!(leader, "Leading camera exhausted");
            return Ok(None);
        };
        self.arbiter.record(leader, target);

        for (index, camera) in self.cameras.iter_mut().enumerate() {
            if index == leader {
                continue;
            }
            if let Some(ts) = Self::catch_up(camera, target)? {
                self.arbiter.record(index, ts);
            }
        }

        let leader = self.arbiter.recompute();
        debug!(timestamp = target, ?leader, "Stepped playback");
        Ok(Some(target))
    }

    /// Skips frames that end before `target - tolerance`, then steps onto the
    /// next frame if it lies within `target + tolerance`.
    fn catch_up(camera: &mut StreamPairHandle, target: u64) -> Result<Option<u64>> {
        let tolerance = camera.tolerance_ns();
        while let Some(ts) = camera.peek_next_timestamp()? {
            if ts.saturating_add(tolerance) < target {
                camera.skip_frame()?;
                continue;
            }
            if ts <= target.saturating_add(tolerance) {
                return camera.next_frame();
            }
            break;
        }
        Ok(None)
    }

    /// Seeks every camera to its first frame at or after `timestamp`.
    pub fn seek_to_timestamp(&mut self, timestamp: u64) -> Result<Option<u64>> {
        self.arbiter.reset();
        self.started = true;
        for (index, camera) in self.cameras.iter_mut().enumerate() {
            if let Some(ts) = camera.seek_to_timestamp(timestamp)? {
                self.arbiter.record(index, ts);
            }
        }
        let leader = self.arbiter.recompute();
        Ok(leader.and_then(|l| self.arbiter.last_timestamp(l)))
    }

    /// Projects every camera that is sitting on a frame. Returns the total point count.
    pub fn project_all(&mut self) -> Result<usize> {
        let mut total = 0;
        for camera in &mut self.cameras {
            if camera.current_frame_index().is_none() {
                continue;
            }
            total += camera.project_current_frame()?.len();
        }
        Ok(total)
    }

    pub fn close(self) {
        for camera in self.cameras {
            camera.close();
        }
    }
}
