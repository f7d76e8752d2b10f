/// Tracks which camera is furthest ahead in time during multi-camera playback.
///
/// Only the leading camera needs to peek its next timestamp to decide how far
/// the whole rig steps. Ties go to the lowest camera index.
#[derive(Debug, Clone, Default)]
pub struct MultiCameraArbiter {
    last_timestamps: Vec<Option<u64>>,
    leading: Option<usize>,
}

impl MultiCameraArbiter {
    pub fn new(camera_count: usize) -> Self {
        Self {
            last_timestamps: vec![None; camera_count],
            leading: None,
        }
    }

    pub fn camera_count(&self) -> usize {
        self.last_timestamps.len()
    }

    /// Stores the timestamp of the frame `camera` just processed.
    pub fn record(&mut self, camera: usize, timestamp: u64) {
        if let Some(slot) = self.last_timestamps.get_mut(camera) {
            *slot = Some(timestamp);
        }
    }

    pub fn last_timestamp(&self, camera: usize) -> Option<u64> {
        self.last_timestamps.get(camera).copied().flatten()
    }

    /// Rescans every camera and returns the new leader.
    pub fn recompute(&mut self) -> Option<usize> {
        let mut leading: Option<(usize, u64)> = None;
        for (camera, timestamp) in self.last_timestamps.iter().enumerate() {
            let Some(timestamp) = *timestamp else {
                continue;
            };
            match leading {
                Some((_, best)) if timestamp <= best => {}
                _ => leading = Some((camera, timestamp)),
            }
        }
        self.leading = leading.map(|(camera, _)| camera);
        self.leading
    }

    pub fn leading_camera(&self) -> Option<usize> {
        self.leading
    }

    pub fn reset(&mut self) {
        self.last_timestamps.iter_mut().for_each(|t| *t = None);
        self.leading = None;
    }
}
