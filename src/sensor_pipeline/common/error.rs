use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed stream header: {0}")]
    MalformedHeader(String),

    #[error("Unsupported stream format tag: {0:?}")]
    UnsupportedFormat([u8; 4]),

    #[error("Unsupported size field width: {0} bytes (expected 2 or 4)")]
    UnsupportedSizeField(u32),

    #[error("Unsupported distortion model with {0} coefficients")]
    UnsupportedDistortion(usize),

    #[error("No extrinsics found for camera {0}")]
    MissingExtrinsics(String),

    #[error("Invalid calibration: {0}")]
    Calibration(String),

    #[error("Failed to parse calibration file: {0}")]
    CalibrationParse(#[from] serde_json::Error),

    #[error("Failed to decode color image: {0}")]
    ColorDecode(#[from] image::ImageError),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Missing stream file: {0}")]
    MissingStream(String),

    #[error("Stream cursor {0} lies outside the record region")]
    InvalidCursor(u64),

    #[error("No synchronized frame is loaded")]
    NoCurrentFrame,

    #[error("No camera could be opened")]
    NoCamerasAvailable,

    #[error("CUDA error: {0}")]
    CudaError(String),

    #[error("Projection backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
