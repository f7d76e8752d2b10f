//! Sensor stream module
//!
//! Parsing, random access, and encoding of the two binary record layouts
//! (fixed-length depth, variable-length color).

mod binary_reader;
mod header;
mod reader;
pub mod types;
mod writer;


pub use binary_reader::BinaryStreamReader;
pub use reader::{SensorStreamReader, StreamCursor};
pub use types::{
    ColorDecoding, DepthImage, FieldSpec, FieldType, RecordPayload, SensorRecord,
    SensorStreamHeader, StreamFormat,
};
pub use writer::SensorStreamWriter;
