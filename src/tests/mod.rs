mod thumbnail_pipeline_tests;

use crate::config::ThumbnailConfig;
use bytes::Bytes;
use image::{ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;

pub(crate) const SOURCE_BUCKET: &str = "private-uploads";

pub(crate) fn test_config() -> ThumbnailConfig {
    ThumbnailConfig {
        destination_bucket: "public-thumbnails".to_string(),
        ..ThumbnailConfig::default()
    }
}

pub(crate) fn encode_image(width: u32, height: u32, format: ImageFormat) -> Bytes {
    let buffer = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    buffer.write_to(&mut Cursor::new(&mut out), format).unwrap();
    Bytes::from(out)
}
