/// Fixed tolerance used when a stream declares no frame rate (8 ms).
pub const FALLBACK_TOLERANCE_NS: u64 = 8_000_000;

/// Default fraction of one frame period accepted as "same instant".
pub const DEFAULT_PERIOD_FRACTION: f64 = 0.25;

/// How far apart two timestamps may be and still count as one synchronized pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncTolerance {
    /// Absolute window in nanoseconds
    Fixed(u64),
    /// Fraction of the depth stream's frame period
    FramePeriodFraction(f64),
}

impl Default for SyncTolerance {
    fn default() -> Self {
        SyncTolerance::FramePeriodFraction(DEFAULT_PERIOD_FRACTION)
    }
}

impl SyncTolerance {
    /// Window in nanoseconds for a stream running at `fps`.
    pub fn resolve(self, fps: f32) -> u64 {
        match self {
            SyncTolerance::Fixed(ns) => ns,
            SyncTolerance::FramePeriodFraction(fraction) => {
                if fps > 0.0 && fps.is_finite() {
                    (1e9 / fps as f64 * fraction.max(0.0)).round() as u64
                } else {
                    FALLBACK_TOLERANCE_NS
                }
            }
        }
    }
}

/// `|depth_ts - color_ts| <= tolerance_ns`.
#[inline]
pub fn is_synchronized(depth_ts: u64, color_ts: u64, tolerance_ns: u64) -> bool {
    depth_ts.abs_diff(color_ts) <= tolerance_ns
}
