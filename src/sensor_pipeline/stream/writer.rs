use std::io::{self, Write};

use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::stream::types::{SensorStreamHeader, StreamFormat};

/// Encoder for the binary recording format.
///
/// Writes the preamble and header on construction, then one record per call.
/// Variable streams are written without a trailing index (`index_offset == 0`).
pub struct SensorStreamWriter<W: Write> {
    output: W,
    header: SensorStreamHeader,
    records_written: u64,
}

impl<W: Write> SensorStreamWriter<W> {
    pub fn new(mut output: W, header: SensorStreamHeader) -> Result<Self> {
        output.write_all(&header.format.tag())?;
        if header.format == StreamFormat::Variable {
            output.write_all(&0u64.to_le_bytes())?;
            output.write_all(&0u64.to_le_bytes())?;
        }
        let header_bytes = header.encode()?;
        output.write_all(&(header_bytes.len() as u32).to_le_bytes())?;
        output.write_all(&header_bytes)?;

        Ok(Self {
            output,
            header,
            records_written: 0,
        })
    }

    pub fn header(&self) -> &SensorStreamHeader {
        &self.header
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    fn metadata(&self, timestamp: u64) -> Vec<u8> {
        let mut metadata = vec![0u8; self.header.metadata_size()];
        let offset = self.header.timestamp_offset();
        metadata[offset..offset + 8].copy_from_slice(&timestamp.to_le_bytes());
        metadata
    }

    /// Appends one depth record. `samples` must hold `width * height` values.
    pub fn write_depth_record(&mut self, timestamp: u64, samples: &[u16]) -> Result<()> {
        if self.header.format != StreamFormat::Fixed {
            return Err(invalid_input("depth records require a fixed-length stream"));
        }
        if samples.len() != self.header.sample_count() {
            return Err(PipelineError::InvalidDimensions(
                samples.len(),
                self.header.sample_count(),
            ));
        }

        let metadata = self.metadata(timestamp);
        self.output.write_all(&metadata)?;
        let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.output.write_all(&payload)?;
        self.records_written += 1;
        Ok(())
    }

    /// Appends one color record holding an already-compressed image blob.
    pub fn write_color_record(&mut self, timestamp: u64, blob: &[u8]) -> Result<()> {
        if self.header.format != StreamFormat::Variable {
            return Err(invalid_input("color records require a variable-length stream"));
        }

        let metadata = self.metadata(timestamp);
        self.output.write_all(&metadata)?;
        match self.header.size_field_width {
            2 => {
                let size = u16::try_from(blob.len())
                    .map_err(|_| invalid_input("blob does not fit a 2-byte size field"))?;
                self.output.write_all(&size.to_le_bytes())?;
            }
            _ => {
                let size = u32::try_from(blob.len())
                    .map_err(|_| invalid_input("blob does not fit a 4-byte size field"))?;
                self.output.write_all(&size.to_le_bytes())?;
            }
        }
        self.output.write_all(blob)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.output.flush()?;
        Ok(self.output)
    }
}

fn invalid_input(message: &str) -> PipelineError {
    PipelineError::IoError(io::Error::new(io::ErrorKind::InvalidInput, message.to_string()))
}
