//! Sensor stream data types

use image::RgbImage;

use crate::sensor_pipeline::common::error::{PipelineError, Result};

/// Tag at the start of a fixed-length (depth) stream.
pub const FIXED_TAG: [u8; 4] = *b"FIXD";
/// Tag at the start of a variable-length (color) stream.
pub const VARIABLE_TAG: [u8; 4] = *b"VARL";

/// Name of the metadata field every record must carry.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Record layout variant, selected by the 4-byte tag at file start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// Metadata followed by `width * height` little-endian `u16` samples.
    Fixed,
    /// Metadata, a 2- or 4-byte size field, then a compressed image blob.
    Variable,
}

impl StreamFormat {
    pub fn from_tag(tag: [u8; 4]) -> Result<Self> {
        match tag {
            FIXED_TAG => Ok(StreamFormat::Fixed),
            VARIABLE_TAG => Ok(StreamFormat::Variable),
            other => Err(PipelineError::UnsupportedFormat(other)),
        }
    }

    pub fn tag(self) -> [u8; 4] {
        match self {
            StreamFormat::Fixed => FIXED_TAG,
            StreamFormat::Variable => VARIABLE_TAG,
        }
    }
}

/// Element type of a metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    U32,
    U64,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl FieldType {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => FieldType::U8,
            1 => FieldType::U16,
            2 => FieldType::U32,
            3 => FieldType::U64,
            4 => FieldType::I16,
            5 => FieldType::I32,
            6 => FieldType::I64,
            7 => FieldType::F32,
            8 => FieldType::F64,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        match self {
            FieldType::U8 => 0,
            FieldType::U16 => 1,
            FieldType::U32 => 2,
            FieldType::U64 => 3,
            FieldType::I16 => 4,
            FieldType::I32 => 5,
            FieldType::I64 => 6,
            FieldType::F32 => 7,
            FieldType::F64 => 8,
        }
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
        }
    }
}

/// One `(name, type, count)` entry of the record field list.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub count: u32,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType, count: u32) -> Self {
        Self {
            name: name.into(),
            field_type,
            count,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.field_type.size() * self.count as usize
    }
}

/// Parsed stream header. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorStreamHeader {
    pub format: StreamFormat,
    pub fields: Vec<FieldSpec>,
    /// Sensor resolution in pixels
    pub width: u32,
    pub height: u32,
    /// Declared frame rate, `0.0` when unknown
    pub fps: f32,
    /// Width of the per-record size field (variable streams only, 2 or 4)
    pub size_field_width: u32,
    /// Flat calibration list: fx, fy, cx, cy, then distortion coefficients
    pub calibration: Vec<f32>,
    metadata_size: usize,
    timestamp_offset: usize,
}

impl SensorStreamHeader {
    /// Validates the field list and size-field width and derives the record layout.
    pub fn new(
        format: StreamFormat,
        fields: Vec<FieldSpec>,
        width: u32,
        height: u32,
        fps: f32,
        size_field_width: u32,
        calibration: Vec<f32>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions(width as usize, height as usize));
        }

        if format == StreamFormat::Variable && !matches!(size_field_width, 2 | 4) {
            return Err(PipelineError::UnsupportedSizeField(size_field_width));
        }

        let mut offset = 0usize;
        let mut timestamp_offset = None;
        for field in &fields {
            if field.name == TIMESTAMP_FIELD {
                if field.field_type != FieldType::U64 || field.count != 1 {
                    return Err(PipelineError::MalformedHeader(format!(
                        "timestamp field must be a single u64, found {:?} x {}",
                        field.field_type, field.count
                    )));
                }
                timestamp_offset = Some(offset);
            }
            offset += field.byte_len();
        }

        let timestamp_offset = timestamp_offset.ok_or_else(|| {
            PipelineError::MalformedHeader("record field list has no timestamp".to_string())
        })?;

        Ok(Self {
            format,
            fields,
            width,
            height,
            fps,
            size_field_width: if format == StreamFormat::Fixed { 0 } else { size_field_width },
            calibration,
            metadata_size: offset,
            timestamp_offset,
        })
    }

    /// Standard depth stream header: timestamp + frame number metadata.
    pub fn depth(width: u32, height: u32, fps: f32, calibration: Vec<f32>) -> Result<Self> {
        Self::new(
            StreamFormat::Fixed,
            default_fields(),
            width,
            height,
            fps,
            0,
            calibration,
        )
    }

    /// Standard color stream header with the given size-field width.
    pub fn color(
        width: u32,
        height: u32,
        fps: f32,
        size_field_width: u32,
        calibration: Vec<f32>,
    ) -> Result<Self> {
        Self::new(
            StreamFormat::Variable,
            default_fields(),
            width,
            height,
            fps,
            size_field_width,
            calibration,
        )
    }

    /// Bytes of the metadata block preceding every payload.
    pub fn metadata_size(&self) -> usize {
        self.metadata_size
    }

    /// Offset of the `timestamp` field inside the metadata block.
    pub fn timestamp_offset(&self) -> usize {
        self.timestamp_offset
    }

    pub fn sample_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Payload length of a fixed-length record; `None` for variable streams.
    pub fn fixed_payload_size(&self) -> Option<usize> {
        match self.format {
            StreamFormat::Fixed => Some(self.sample_count() * 2),
            StreamFormat::Variable => None,
        }
    }

    /// One frame period in nanoseconds, when the frame rate is known.
    pub fn frame_period_ns(&self) -> Option<f64> {
        if self.fps > 0.0 && self.fps.is_finite() {
            Some(1e9 / self.fps as f64)
        } else {
            None
        }
    }
}

fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(TIMESTAMP_FIELD, FieldType::U64, 1),
        FieldSpec::new("frame_number", FieldType::U32, 1),
    ]
}

/// Row-major depth samples of one depth record.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<u16>,
}

impl DepthImage {
    pub fn new(width: usize, height: usize, samples: Vec<u16>) -> Result<Self> {
        if samples.len() != width * height {
            return Err(PipelineError::InvalidDimensions(width, height));
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.samples[y * self.width + x]
    }
}

/// Payload of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    Depth(DepthImage),
    Color(RgbImage),
    /// Compressed color blob whose decoding was deferred
    EncodedColor(Vec<u8>),
}

/// One timestamped unit read from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    /// Nanosecond timestamp
    pub timestamp: u64,
    /// Zero-based position of the record within its stream
    pub index: u64,
    pub payload: RecordPayload,
}

impl SensorRecord {
    pub fn as_depth(&self) -> Option<&DepthImage> {
        match &self.payload {
            RecordPayload::Depth(depth) => Some(depth),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<&RgbImage> {
        match &self.payload {
            RecordPayload::Color(color) => Some(color),
            _ => None,
        }
    }

    /// Decodes a deferred color blob in place. No-op for other payloads.
    pub fn decode_color(&mut self) -> Result<()> {
        if let RecordPayload::EncodedColor(blob) = &self.payload {
            let image = decode_color_blob(blob)?;
            self.payload = RecordPayload::Color(image);
        }
        Ok(())
    }
}

pub(crate) fn decode_color_blob(blob: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory(blob)?.to_rgb8())
}

/// Whether color payloads are decoded while parsing or kept compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorDecoding {
    #[default]
    Decode,
    /// Keep raw bytes for a downstream decode path
    Defer,
}
