//! Proportional downscaling of accepted images

use crate::error::{Result, ThumbnailError};
use bytes::Bytes;
use image::imageops::FilterType;
use image::ImageFormat;
use std::io::Cursor;
use tracing::{debug, info};

/// Encoded thumbnail ready to be stored
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub data: Bytes,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

impl Thumbnail {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Dimensions of the thumbnail for a `width`x`height` source.
///
/// Sources no wider than `max_width` keep their size. Wider sources get
/// `max_width` and a height of `floor(max_width * height / width)`, truncated
/// rather than rounded, clamped to at least one pixel.
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }

    let scaled = u64::from(max_width) * u64::from(height) / u64::from(width);
    (max_width, (scaled as u32).max(1))
}

/// Decode `data`, shrink it to `max_width` if needed and re-encode in the source format
pub fn make_thumbnail(data: Bytes, max_width: u32) -> Result<Thumbnail> {
    let format = image::guess_format(&data)
        .map_err(|e| ThumbnailError::Decode(format!("unrecognised image format: {e}")))?;

    let image = image::load_from_memory_with_format(&data, format)
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ThumbnailError::Decode(format!(
            "image has no pixels: {width}x{height}"
        )));
    }

    let (target_width, target_height) = target_dimensions(width, height, max_width);
    if (target_width, target_height) == (width, height) {
        debug!("Image is {}x{}, no resize needed", width, height);
        return Ok(Thumbnail {
            data,
            format,
            width,
            height,
            resized: false,
        });
    }

    info!(
        "Resizing image from {}x{} to {}x{}",
        width, height, target_width, target_height
    );
    let resized = image.resize_exact(target_width, target_height, FilterType::Lanczos3);

    let mut encoded = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut encoded), format)
        .map_err(|e| ThumbnailError::Encode(format!("{format:?}: {e}")))?;

    Ok(Thumbnail {
        data: Bytes::from(encoded),
        format,
        width: target_width,
        height: target_height,
        resized: true,
    })
}
