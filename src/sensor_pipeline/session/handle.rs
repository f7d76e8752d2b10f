use std::fs::File;
use std::io::BufReader;

use tracing::{debug, info, instrument};

use crate::sensor_pipeline::camera::{
    CalibrationFile, CameraModel, CameraRig, DepthCalibration, ExtrinsicTransform,
};
use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::common::timing::PipelineTimings;
use crate::sensor_pipeline::projection::{
    PointBuffer, ProjectionInput, ProjectionStrategy, Projector,
};
use crate::sensor_pipeline::session::types::{SessionConfig, StreamPairPaths};
use crate::sensor_pipeline::stream::{
    BinaryStreamReader, SensorStreamReader, StreamFormat,
};
use crate::sensor_pipeline::sync::{StreamSynchronizer, SyncedFramePair};

pub type FileStreamReader = BinaryStreamReader<BufReader<File>>;

/// Read-only view a renderer or exporter needs of one camera.
pub trait FrameSource {
    /// Synchronized pair index of the frame last seeked to or stepped onto.
    fn current_frame_index(&self) -> Option<u64>;

    fn current_timestamp(&self) -> Option<u64>;

    fn processing_kind(&self) -> ProjectionStrategy;

    /// Points of the last projected frame.
    fn export_current_frame(&self) -> Option<&PointBuffer>;
}

/// One camera's open depth/color recordings plus everything needed to project them.
///
/// Owns its readers; every call that moves a cursor takes `&mut self`.
pub struct StreamPairHandle {
    serial: String,
    sync: StreamSynchronizer<FileStreamReader, FileStreamReader>,
    rig: CameraRig,
    world_pose: Option<ExtrinsicTransform>,
    projector: Projector,
    current: Option<SyncedFramePair>,
    points: Option<PointBuffer>,
    timings: PipelineTimings,
}

/// Opens both recordings of a camera and builds its models, tables, and projector.
#[instrument(skip_all, fields(serial = %paths.serial))]
pub fn open_stream_pair(
    paths: &StreamPairPaths,
    calibration: &CalibrationFile,
    config: &SessionConfig,
) -> Result<StreamPairHandle> {
    let mut timings = PipelineTimings::new();

    let depth = timings.time("open_depth", || BinaryStreamReader::open(&paths.depth))?;
    let color = timings.time("open_color", || BinaryStreamReader::open(&paths.color))?;
    let color = color.with_color_decoding(config.color_decoding);
    if depth.header().format != StreamFormat::Fixed {
        return Err(PipelineError::MalformedHeader(format!(
            "{} must hold fixed-length depth records",
            paths.depth.display()
        )));
    }
    if color.header().format != StreamFormat::Variable {
        return Err(PipelineError::MalformedHeader(format!(
            "{} must hold variable-length color records",
            paths.color.display()
        )));
    }

    let camera = calibration.camera(&paths.serial)?;
    let extrinsics = camera.depth_to_color(&paths.serial)?;
    let world_pose = camera.world_pose()?;
    let depth_model = CameraModel::from_header(depth.header())?
        .with_depth_calibration(camera.depth_calibration(DepthCalibration::default())?);
    let color_model = CameraModel::from_header(color.header())?;

    let rig = timings.time("undistortion_table", || {
        CameraRig::new(depth_model, color_model, extrinsics)
    });
    let projector = config.build_projector()?;

    let sync = StreamSynchronizer::new(depth, color, config.tolerance)
        .with_frame_index_strategy(config.frame_index_strategy);

    info!(
        depth = %format!("{}x{}", rig.depth_model.width, rig.depth_model.height),
        color = %format!("{}x{}", rig.color_model.width, rig.color_model.height),
        tolerance_ns = sync.tolerance_ns(),
        strategy = %projector.kind(),
        "Opened stream pair"
    );
    debug!("Setup timings: {}", timings.summary());

    Ok(StreamPairHandle {
        serial: paths.serial.clone(),
        sync,
        rig,
        world_pose,
        projector,
        current: None,
        points: None,
        timings,
    })
}

impl StreamPairHandle {
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    /// Camera pose in the shared scene frame, when calibrated.
    pub fn world_pose(&self) -> Option<&ExtrinsicTransform> {
        self.world_pose.as_ref()
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn tolerance_ns(&self) -> u64 {
        self.sync.tolerance_ns()
    }

    pub fn current_pair(&self) -> Option<&SyncedFramePair> {
        self.current.as_ref()
    }

    /// Timings of the most recent seek, step, or projection.
    pub fn timings(&self) -> &PipelineTimings {
        &self.timings
    }

    fn set_current(&mut self, pair: Option<SyncedFramePair>) -> Option<u64> {
        self.points = None;
        self.current = pair;
        self.current.as_ref().map(SyncedFramePair::timestamp)
    }

    /// Moves to the `index`th synchronized frame. Returns the achieved timestamp.
    pub fn seek_to_frame(&mut self, index: u64) -> Result<Option<u64>> {
        self.timings = PipelineTimings::new();
        let pair = self
            .timings
            .time("seek", || self.sync.seek_to_frame_index(index))?;
        let timestamp = self.set_current(pair);
        match timestamp {
            Some(ts) => info!(serial = %self.serial, index, timestamp = ts, "Seeked to frame"),
            None => info!(serial = %self.serial, index, "Frame index past end of recording"),
        }
        Ok(timestamp)
    }

    /// Moves to the first synchronized frame at or after `timestamp`.
    pub fn seek_to_timestamp(&mut self, timestamp: u64) -> Result<Option<u64>> {
        self.timings = PipelineTimings::new();
        let pair = self
            .timings
            .time("seek", || self.sync.seek_to_timestamp(timestamp))?;
        let achieved = self.set_current(pair);
        match achieved {
            Some(ts) => info!(serial = %self.serial, requested = timestamp, achieved = ts, "Seeked to timestamp"),
            None => info!(serial = %self.serial, requested = timestamp, "No frame at or after timestamp"),
        }
        Ok(achieved)
    }

    /// Steps onto the next synchronized frame.
    pub fn next_frame(&mut self) -> Result<Option<u64>> {
        self.timings = PipelineTimings::new();
        let pair = self.timings.time("next_pair", || self.sync.next_pair())?;
        Ok(self.set_current(pair))
    }

    /// Moves past the next synchronized frame without decoding it.
    ///
    /// The current frame stays what it was.
    pub fn skip_frame(&mut self) -> Result<Option<u64>> {
        Ok(self.sync.skip_pair()?.map(|(depth_ts, _)| depth_ts))
    }

    /// Depth timestamp of the next synchronized frame, without consuming it.
    pub fn peek_next_timestamp(&mut self) -> Result<Option<u64>> {
        self.sync.peek_next_synchronized()
    }

    /// Projects the current frame with this handle's own projector.
    pub fn project_current_frame(&mut self) -> Result<&PointBuffer> {
        let buffer = self.project_with(None)?;
        Ok(self.points.insert(buffer))
    }

    /// Projects the current frame with a caller-supplied projector.
    pub fn project_current_frame_with(&mut self, projector: &Projector) -> Result<&PointBuffer> {
        let buffer = self.project_with(Some(projector))?;
        Ok(self.points.insert(buffer))
    }

    fn project_with(&mut self, projector: Option<&Projector>) -> Result<PointBuffer> {
        let Some(pair) = self.current.as_mut() else {
            return Err(PipelineError::NoCurrentFrame);
        };
        self.timings
            .time("decode_color", || pair.color.decode_color())?;

        let depth = pair
            .depth
            .as_depth()
            .ok_or_else(|| PipelineError::MissingStream(format!("{} depth payload", self.serial)))?;
        let color = pair
            .color
            .as_color()
            .ok_or_else(|| PipelineError::MissingStream(format!("{} color payload", self.serial)))?;
        let input = ProjectionInput {
            rig: &self.rig,
            depth,
            color,
            timestamp: pair.timestamp(),
            frame_index: pair.index,
        };

        let projector = projector.unwrap_or(&self.projector);
        let buffer = self.timings.time("project", || projector.project(&input))?;
        debug!(
            serial = %self.serial,
            frame = buffer.frame_index,
            points = buffer.len(),
            "Timings: {}",
            self.timings.summary()
        );
        Ok(buffer)
    }

    pub fn close(self) {
        info!(
            serial = %self.serial,
            pairs_read = self.sync.pairs_consumed(),
            "Closed stream pair"
        );
    }
}

impl FrameSource for StreamPairHandle {
    fn current_frame_index(&self) -> Option<u64> {
        self.current.as_ref().map(|p| p.index)
    }

    fn current_timestamp(&self) -> Option<u64> {
        self.current.as_ref().map(SyncedFramePair::timestamp)
    }

    fn processing_kind(&self) -> ProjectionStrategy {
        self.projector.kind()
    }

    fn export_current_frame(&self) -> Option<&PointBuffer> {
        self.points.as_ref()
    }
}
