//! Production probe built on the `image` crate's pure Rust decoders.
//!
//! Only the header is read, so probing a large photograph costs a few
//! kilobytes of IO rather than a full decode.

use super::backend::{Dimensions, ImageProbe, ProbeError};
use image::ImageFormat;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the image file extensions the scan stage picks up.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateProbe;

impl ImageCrateProbe {
    pub fn new() -> Self {
        Self
    }
}

impl ImageProbe for ImageCrateProbe {
    fn identify(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| match e {
            image::ImageError::IoError(io) => ProbeError::Io(io),
            other => ProbeError::Unreadable {
                path: path.display().to_string(),
                reason: other.to_string(),
            },
        })?;
        Ok(Dimensions { width, height })
    }
}
