//! Synthetic recordings shared by the unit tests.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbImage};

use crate::sensor_pipeline::stream::{SensorStreamHeader, SensorStreamWriter};

/// `[fx, fy, cx, cy]` with no distortion terms.
pub fn pinhole(fx: f32, fy: f32, cx: f32, cy: f32) -> Vec<f32> {
    vec![fx, fy, cx, cy]
}

pub fn png_blob(image: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("png encoding of a test image");
    out.into_inner()
}

/// Depth stream with one record per timestamp; `sample(record, x, y)` fills pixels.
pub fn depth_stream_bytes(
    width: u32,
    height: u32,
    fps: f32,
    calibration: Vec<f32>,
    timestamps: &[u64],
    sample: impl Fn(usize, u32, u32) -> u16,
) -> Vec<u8> {
    let header = SensorStreamHeader::depth(width, height, fps, calibration).expect("depth header");
    let mut writer = SensorStreamWriter::new(Vec::new(), header).expect("depth writer");
    for (record, &timestamp) in timestamps.iter().enumerate() {
        let samples: Vec<u16> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| sample(record, x, y))
            .collect();
        writer
            .write_depth_record(timestamp, &samples)
            .expect("depth record");
    }
    writer.finish().expect("flush depth stream")
}

/// Color stream of PNG blobs; `color(record, x, y)` fills pixels.
pub fn color_stream_bytes(
    width: u32,
    height: u32,
    fps: f32,
    size_field_width: u32,
    calibration: Vec<f32>,
    timestamps: &[u64],
    color: impl Fn(usize, u32, u32) -> [u8; 3],
) -> Vec<u8> {
    let header = SensorStreamHeader::color(width, height, fps, size_field_width, calibration)
        .expect("color header");
    let mut writer = SensorStreamWriter::new(Vec::new(), header).expect("color writer");
    for (record, &timestamp) in timestamps.iter().enumerate() {
        let image = RgbImage::from_fn(width, height, |x, y| image::Rgb(color(record, x, y)));
        writer
            .write_color_record(timestamp, &png_blob(&image))
            .expect("color record");
    }
    writer.finish().expect("flush color stream")
}

/// Writes a camera directory (`depth.bin`, `color.bin`) under `root`.
pub fn write_camera_dir(root: &Path, serial: &str, depth: &[u8], color: &[u8]) {
    let dir = root.join(serial);
    std::fs::create_dir_all(&dir).expect("camera dir");
    std::fs::write(dir.join("depth.bin"), depth).expect("depth.bin");
    std::fs::write(dir.join("color.bin"), color).expect("color.bin");
}

/// Calibration JSON with identity extrinsics for every serial.
pub fn identity_calibration_json(serials: &[&str]) -> String {
    let cameras: Vec<String> = serials
        .iter()
        .map(|serial| {
            format!(
                r#""{serial}": {{
                    "depth_to_color": {{
                        "rotation": [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                        "translation": [0.0, 0.0, 0.0]
                    }}
                }}"#
            )
        })
        .collect();
    format!(r#"{{ "cameras": {{ {} }} }}"#, cameras.join(","))
}
