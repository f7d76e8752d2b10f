//! Pairing of depth and color records from two independently clocked streams.
//!
//! Seeking is forward-only: every seek rewinds both readers to their first
//! record and scans forward, skipping payloads it does not need.

use tracing::{debug, instrument, trace};

use crate::sensor_pipeline::common::error::Result;
use crate::sensor_pipeline::stream::{SensorRecord, SensorStreamReader};
use crate::sensor_pipeline::sync::tolerance::{SyncTolerance, is_synchronized};

/// How a frame index is turned into a stream position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameIndexStrategy {
    /// Walk synchronized pairs and count them. Exact and deterministic.
    #[default]
    Count,
    /// Estimate a timestamp from the declared frame rate, then seek to it.
    /// Falls back to `Count` when the depth stream has no frame rate.
    Estimate,
}

/// A depth record and a color record within the synchronization tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedFramePair {
    /// Synchronized pairs preceding this one since stream start
    pub index: u64,
    pub depth: SensorRecord,
    pub color: SensorRecord,
}

impl SyncedFramePair {
    /// Achieved timestamp of the pair (the depth timestamp).
    pub fn timestamp(&self) -> u64 {
        self.depth.timestamp
    }

    /// `depth - color` in nanoseconds.
    pub fn delta_ns(&self) -> i128 {
        self.depth.timestamp as i128 - self.color.timestamp as i128
    }
}

pub struct StreamSynchronizer<D: SensorStreamReader, C: SensorStreamReader> {
    depth: D,
    color: C,
    tolerance_ns: u64,
    frame_index_strategy: FrameIndexStrategy,
    pairs_consumed: u64,
}

impl<D: SensorStreamReader, C: SensorStreamReader> StreamSynchronizer<D, C> {
    pub fn new(depth: D, color: C, tolerance: SyncTolerance) -> Self {
        let tolerance_ns = tolerance.resolve(depth.header().fps);
        debug!(tolerance_ns, "Created stream synchronizer");
        Self {
            depth,
            color,
            tolerance_ns,
            frame_index_strategy: FrameIndexStrategy::default(),
            pairs_consumed: 0,
        }
    }

    pub fn with_frame_index_strategy(mut self, strategy: FrameIndexStrategy) -> Self {
        self.frame_index_strategy = strategy;
        self
    }

    pub fn tolerance_ns(&self) -> u64 {
        self.tolerance_ns
    }

    pub fn frame_index_strategy(&self) -> FrameIndexStrategy {
        self.frame_index_strategy
    }

    pub fn depth(&self) -> &D {
        &self.depth
    }

    pub fn color(&self) -> &C {
        &self.color
    }

    /// Synchronized pairs parsed or skipped since the last rewind.
    pub fn pairs_consumed(&self) -> u64 {
        self.pairs_consumed
    }

    pub fn is_synchronized(&self, depth_ts: u64, color_ts: u64) -> bool {
        is_synchronized(depth_ts, color_ts, self.tolerance_ns)
    }

    /// Skips unmatched records until both cursors sit on a synchronized pair.
    ///
    /// Returns the pair's `(depth, color)` timestamps without consuming it, or
    /// `None` once either stream is exhausted.
    pub fn align(&mut self) -> Result<Option<(u64, u64)>> {
        loop {
            let Some(depth_ts) = self.depth.peek_next_timestamp()? else {
                return Ok(None);
            };
            let Some(color_ts) = self.color.peek_next_timestamp()? else {
                return Ok(None);
            };

            if self.is_synchronized(depth_ts, color_ts) {
                return Ok(Some((depth_ts, color_ts)));
            }

            trace!(depth_ts, color_ts, "Skipping unmatched record");
            let advanced = if depth_ts < color_ts {
                self.depth.skip_current_record()?
            } else {
                self.color.skip_current_record()?
            };
            if !advanced {
                return Ok(None);
            }
        }
    }

    /// Depth timestamp of the next synchronized pair.
    pub fn peek_next_synchronized(&mut self) -> Result<Option<u64>> {
        Ok(self.align()?.map(|(depth_ts, _)| depth_ts))
    }

    /// Parses the next synchronized pair.
    ///
    /// Either both records are consumed or neither: a color record that ends
    /// the stream or fails to decode leaves the depth cursor where it was.
    pub fn next_pair(&mut self) -> Result<Option<SyncedFramePair>> {
        if self.align()?.is_none() {
            return Ok(None);
        }
        let mark = self.depth.cursor();
        let Some(depth) = self.depth.parse_next_record()? else {
            return Ok(None);
        };
        let color = match self.color.parse_next_record() {
            Ok(Some(color)) => color,
            Ok(None) => {
                self.depth.restore(mark)?;
                return Ok(None);
            }
            Err(e) => {
                self.depth.restore(mark)?;
                return Err(e);
            }
        };

        let pair = SyncedFramePair {
            index: self.pairs_consumed,
            depth,
            color,
        };
        self.pairs_consumed += 1;
        Ok(Some(pair))
    }

    /// Moves past the next synchronized pair without decoding either payload.
    pub fn skip_pair(&mut self) -> Result<Option<(u64, u64)>> {
        let Some(timestamps) = self.align()? else {
            return Ok(None);
        };
        let mark = self.depth.cursor();
        if !self.depth.skip_current_record()? {
            return Ok(None);
        }
        match self.color.skip_current_record() {
            Ok(true) => {}
            Ok(false) => {
                self.depth.restore(mark)?;
                return Ok(None);
            }
            Err(e) => {
                self.depth.restore(mark)?;
                return Err(e);
            }
        }
        self.pairs_consumed += 1;
        Ok(Some(timestamps))
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.depth.rewind()?;
        self.color.rewind()?;
        self.pairs_consumed = 0;
        Ok(())
    }

    /// First synchronized pair whose depth timestamp is at or after `target`.
    #[instrument(skip(self))]
    pub fn seek_to_timestamp(&mut self, target: u64) -> Result<Option<SyncedFramePair>> {
        self.rewind()?;
        loop {
            let Some((depth_ts, _)) = self.align()? else {
                debug!(timestamp = target, skipped = self.pairs_consumed, "No synchronized frame at or after target");
                return Ok(None);
            };
            if depth_ts >= target {
                return self.next_pair();
            }
            if self.skip_pair()?.is_none() {
                return Ok(None);
            }
        }
    }

    /// The `n`th synchronized pair (zero-based) from stream start.
    #[instrument(skip(self))]
    pub fn seek_to_frame_index(&mut self, n: u64) -> Result<Option<SyncedFramePair>> {
        let period = self.depth.header().frame_period_ns();
        match (self.frame_index_strategy, period) {
            (FrameIndexStrategy::Estimate, Some(period)) => {
                self.rewind()?;
                let Some(first) = self.depth.peek_next_timestamp()? else {
                    return Ok(None);
                };
                // Half a period early so jitter rounds to the nearest frame.
                let offset = (n as f64 * period - period / 2.0).max(0.0).round() as u64;
                self.seek_to_timestamp(first.saturating_add(offset))
            }
            _ => {
                self.rewind()?;
                for _ in 0..n {
                    if self.skip_pair()?.is_none() {
                        debug!(n, available = self.pairs_consumed, "Frame index past end of stream");
                        return Ok(None);
                    }
                }
                self.next_pair()
            }
        }
    }

    pub fn into_readers(self) -> (D, C) {
        (self.depth, self.color)
    }
}
