//! Encoding and decoding of the structured parameter block.

use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::stream::types::{FieldSpec, FieldType, SensorStreamHeader, StreamFormat};

/// Little-endian cursor over the header bytes. Every overrun is a malformed header.
struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(PipelineError::MalformedHeader(format!(
                "{} needs {} bytes at offset {}, header has {}",
                what,
                len,
                self.pos,
                self.bytes.len()
            ))),
        }
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array(what)?))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn f32(&mut self, what: &str) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array(what)?))
    }
}

impl SensorStreamHeader {
    /// Parses the structured parameter block of a stream whose tag selected `format`.
    pub fn decode(bytes: &[u8], format: StreamFormat) -> Result<Self> {
        let mut cursor = ByteCursor::new(bytes);

        let field_count = cursor.u16("field count")?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let name_len = cursor.u8("field name length")? as usize;
            let name = std::str::from_utf8(cursor.take(name_len, "field name")?)
                .map_err(|e| PipelineError::MalformedHeader(format!("field name: {}", e)))?
                .to_string();
            let code = cursor.u8("field type")?;
            let field_type = FieldType::from_code(code).ok_or_else(|| {
                PipelineError::MalformedHeader(format!("unknown field type code {} for {}", code, name))
            })?;
            let count = cursor.u32("field count")?;
            fields.push(FieldSpec::new(name, field_type, count));
        }

        let width = cursor.u32("width")?;
        let height = cursor.u32("height")?;
        let fps = cursor.f32("fps")?;
        let payload_descriptor = cursor.u32("payload descriptor")?;

        let calibration_len = cursor.u16("calibration length")? as usize;
        let mut calibration = Vec::with_capacity(calibration_len);
        for _ in 0..calibration_len {
            calibration.push(cursor.f32("calibration value")?);
        }

        let size_field_width = match format {
            StreamFormat::Fixed => 0,
            StreamFormat::Variable => payload_descriptor,
        };

        let header = SensorStreamHeader::new(
            format,
            fields,
            width,
            height,
            fps,
            size_field_width,
            calibration,
        )?;

        if let Some(expected) = header.fixed_payload_size() {
            if payload_descriptor as usize != expected {
                return Err(PipelineError::MalformedHeader(format!(
                    "declared payload size {} does not match {}x{} depth samples",
                    payload_descriptor, width, height
                )));
            }
        }

        Ok(header)
    }

    /// Inverse of [`SensorStreamHeader::decode`].
    ///
    /// Fails when a count or name length does not fit its on-disk width.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&narrow::<u16>(self.fields.len(), "field count")?.to_le_bytes());
        for field in &self.fields {
            out.push(narrow::<u8>(field.name.len(), "field name length")?);
            out.extend_from_slice(field.name.as_bytes());
            out.push(field.field_type.code());
            out.extend_from_slice(&field.count.to_le_bytes());
        }
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.fps.to_le_bytes());

        let payload_descriptor = match self.fixed_payload_size() {
            Some(size) => narrow::<u32>(size, "depth payload size")?,
            None => self.size_field_width,
        };
        out.extend_from_slice(&payload_descriptor.to_le_bytes());

        out.extend_from_slice(
            &narrow::<u16>(self.calibration.len(), "calibration length")?.to_le_bytes(),
        );
        for value in &self.calibration {
            out.extend_from_slice(&value.to_le_bytes());
        }
        Ok(out)
    }
}

fn narrow<T: TryFrom<usize>>(value: usize, what: &str) -> Result<T> {
    T::try_from(value).map_err(|_| {
        PipelineError::MalformedHeader(format!("{} {} does not fit its on-disk field", what, value))
    })
}
