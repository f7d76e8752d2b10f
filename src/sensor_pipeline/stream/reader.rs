use crate::sensor_pipeline::common::error::Result;
use crate::sensor_pipeline::stream::types::{SensorRecord, SensorStreamHeader};

/// Saved read position of a stream, see [`SensorStreamReader::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    pub offset: u64,
    pub records_consumed: u64,
}

/// Cursor-based access to one sensor stream.
///
/// End of stream is never an error: peeks and parses return `Ok(None)` and skips
/// return `Ok(false)`. A single reader must not be advanced from two call sites
/// at once; every advancing method takes `&mut self`.
pub trait SensorStreamReader {
    fn header(&self) -> &SensorStreamHeader;

    /// Timestamp of the next record, leaving the cursor in place.
    fn peek_next_timestamp(&mut self) -> Result<Option<u64>>;

    /// Consumes the next record, decoding its payload.
    fn parse_next_record(&mut self) -> Result<Option<SensorRecord>>;

    /// Moves past the next record without decoding its payload.
    fn skip_current_record(&mut self) -> Result<bool>;

    /// Returns the cursor to the first record.
    fn rewind(&mut self) -> Result<()>;

    /// Records parsed or skipped since the last rewind.
    fn records_consumed(&self) -> u64;

    /// Current read position.
    fn cursor(&self) -> StreamCursor;

    /// Moves back to a position previously returned by [`cursor`](Self::cursor).
    fn restore(&mut self, cursor: StreamCursor) -> Result<()>;
}
