//! Stream reader over the binary recording format.
//!
//! The reader keeps its own byte cursor (`position`) into the record region and
//! only touches the underlying `Read + Seek` when a record is peeked, parsed, or
//! skipped. Truncated trailing records are treated as end of stream.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::sensor_pipeline::common::error::{PipelineError, Result};
use crate::sensor_pipeline::stream::reader::{SensorStreamReader, StreamCursor};
use crate::sensor_pipeline::stream::types::{
    ColorDecoding, DepthImage, RecordPayload, SensorRecord, SensorStreamHeader, StreamFormat,
    decode_color_blob,
};

/// Byte layout of the record under the cursor.
struct RecordLayout {
    timestamp: u64,
    payload_offset: u64,
    payload_len: u64,
}

impl RecordLayout {
    fn end(&self) -> u64 {
        self.payload_offset + self.payload_len
    }
}

pub struct BinaryStreamReader<R: Read + Seek> {
    inner: R,
    /// Where `inner` currently points, to avoid redundant seeks
    inner_pos: u64,
    header: SensorStreamHeader,
    data_start: u64,
    data_end: u64,
    position: u64,
    records_consumed: u64,
    color_decoding: ColorDecoding,
}

impl BinaryStreamReader<BufReader<File>> {
    /// Opens a stream file and parses its header.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PipelineError::MissingStream(path.display().to_string()),
            _ => PipelineError::IoError(e),
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> BinaryStreamReader<R> {
    /// Parses the preamble and header block, leaving the cursor on the first record.
    pub fn new(mut inner: R) -> Result<Self> {
        let file_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        let tag: [u8; 4] = read_preamble(&mut inner, "format tag")?;
        let format = StreamFormat::from_tag(tag)?;

        let (index_offset, prefix_len) = match format {
            StreamFormat::Fixed => (0u64, 4u64),
            StreamFormat::Variable => {
                let index_offset = u64::from_le_bytes(read_preamble(&mut inner, "index offset")?);
                let _reserved: [u8; 8] = read_preamble(&mut inner, "reserved block")?;
                (index_offset, 20u64)
            }
        };

        let header_len = u32::from_le_bytes(read_preamble(&mut inner, "header length")?) as u64;
        let header_start = prefix_len + 4;
        if header_start + header_len > file_len {
            return Err(PipelineError::MalformedHeader(format!(
                "declared header length {} exceeds the {} bytes remaining",
                header_len,
                file_len.saturating_sub(header_start)
            )));
        }

        let mut header_bytes = vec![0u8; header_len as usize];
        inner.read_exact(&mut header_bytes)?;
        let header = SensorStreamHeader::decode(&header_bytes, format)?;

        let data_start = header_start + header_len;
        let data_end = if index_offset != 0 {
            if index_offset < data_start || index_offset > file_len {
                return Err(PipelineError::MalformedHeader(format!(
                    "index offset {} outside record region {}..{}",
                    index_offset, data_start, file_len
                )));
            }
            index_offset
        } else {
            file_len
        };

        debug!(
            ?format,
            width = header.width,
            height = header.height,
            fps = header.fps,
            metadata_size = header.metadata_size(),
            data_bytes = data_end - data_start,
            "Parsed stream header"
        );

        Ok(Self {
            inner,
            inner_pos: data_start,
            header,
            data_start,
            data_end,
            position: data_start,
            records_consumed: 0,
            color_decoding: ColorDecoding::default(),
        })
    }

    pub fn with_color_decoding(mut self, color_decoding: ColorDecoding) -> Self {
        self.color_decoding = color_decoding;
        self
    }

    /// Byte offset of the next record.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn seek_to(&mut self, offset: u64) -> Result<()> {
        if self.inner_pos != offset {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.inner_pos = offset;
        }
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.seek_to(offset)?;
        // Unknown until the read completes.
        self.inner_pos = u64::MAX;
        self.inner.read_exact(buf)?;
        self.inner_pos = offset + buf.len() as u64;
        Ok(())
    }

    fn park_at_end(&mut self, declared_end: u64) {
        warn!(
            position = self.position,
            declared_end,
            data_end = self.data_end,
            "Truncated record, treating as end of stream"
        );
        self.position = self.data_end;
    }

    /// Reads the metadata and size prefix of the record under the cursor.
    fn locate_record(&mut self) -> Result<Option<RecordLayout>> {
        let metadata_size = self.header.metadata_size() as u64;
        if self.position >= self.data_end {
            return Ok(None);
        }
        if self.position + metadata_size > self.data_end {
            self.park_at_end(self.position + metadata_size);
            return Ok(None);
        }

        let mut metadata = vec![0u8; metadata_size as usize];
        self.read_at(self.position, &mut metadata)?;
        let ts_offset = self.header.timestamp_offset();
        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&metadata[ts_offset..ts_offset + 8]);
        let timestamp = u64::from_le_bytes(ts_bytes);

        let after_metadata = self.position + metadata_size;
        let layout = match self.header.format {
            StreamFormat::Fixed => RecordLayout {
                timestamp,
                payload_offset: after_metadata,
                payload_len: self.header.sample_count() as u64 * 2,
            },
            StreamFormat::Variable => {
                let width = self.header.size_field_width as u64;
                if after_metadata + width > self.data_end {
                    self.park_at_end(after_metadata + width);
                    return Ok(None);
                }
                let payload_len = match width {
                    2 => {
                        let mut buf = [0u8; 2];
                        self.read_at(after_metadata, &mut buf)?;
                        u16::from_le_bytes(buf) as u64
                    }
                    4 => {
                        let mut buf = [0u8; 4];
                        self.read_at(after_metadata, &mut buf)?;
                        u32::from_le_bytes(buf) as u64
                    }
                    other => return Err(PipelineError::UnsupportedSizeField(other as u32)),
                };
                RecordLayout {
                    timestamp,
                    payload_offset: after_metadata + width,
                    payload_len,
                }
            }
        };

        if layout.end() > self.data_end {
            self.park_at_end(layout.end());
            return Ok(None);
        }

        Ok(Some(layout))
    }

    fn decode_payload(&self, bytes: Vec<u8>) -> Result<RecordPayload> {
        match self.header.format {
            StreamFormat::Fixed => {
                let samples = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(RecordPayload::Depth(DepthImage::new(
                    self.header.width as usize,
                    self.header.height as usize,
                    samples,
                )?))
            }
            StreamFormat::Variable => match self.color_decoding {
                ColorDecoding::Decode => Ok(RecordPayload::Color(decode_color_blob(&bytes)?)),
                ColorDecoding::Defer => Ok(RecordPayload::EncodedColor(bytes)),
            },
        }
    }
}

impl<R: Read + Seek> SensorStreamReader for BinaryStreamReader<R> {
    fn header(&self) -> &SensorStreamHeader {
        &self.header
    }

    fn peek_next_timestamp(&mut self) -> Result<Option<u64>> {
        Ok(self.locate_record()?.map(|layout| layout.timestamp))
    }

    fn parse_next_record(&mut self) -> Result<Option<SensorRecord>> {
        let Some(layout) = self.locate_record()? else {
            return Ok(None);
        };

        let mut bytes = vec![0u8; layout.payload_len as usize];
        self.read_at(layout.payload_offset, &mut bytes)?;
        let payload = self.decode_payload(bytes)?;

        let record = SensorRecord {
            timestamp: layout.timestamp,
            index: self.records_consumed,
            payload,
        };
        self.position = layout.end();
        self.records_consumed += 1;
        Ok(Some(record))
    }

    fn skip_current_record(&mut self) -> Result<bool> {
        match self.locate_record()? {
            Some(layout) => {
                self.position = layout.end();
                self.records_consumed += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = self.data_start;
        self.records_consumed = 0;
        Ok(())
    }

    fn records_consumed(&self) -> u64 {
        self.records_consumed
    }

    fn cursor(&self) -> StreamCursor {
        StreamCursor {
            offset: self.position,
            records_consumed: self.records_consumed,
        }
    }

    fn restore(&mut self, cursor: StreamCursor) -> Result<()> {
        if cursor.offset < self.data_start || cursor.offset > self.data_end {
            return Err(PipelineError::InvalidCursor(cursor.offset));
        }
        self.position = cursor.offset;
        self.records_consumed = cursor.records_consumed;
        Ok(())
    }
}

fn read_preamble<R: Read, const N: usize>(inner: &mut R, what: &str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    inner.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            PipelineError::MalformedHeader(format!("file ends before the {}", what))
        }
        _ => PipelineError::IoError(e),
    })?;
    Ok(buf)
}
