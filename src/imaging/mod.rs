//! Image identification.
//!
//! The process stage only needs the intrinsic dimensions of each image so the
//! lazy image container can reserve its aspect ratio before anything loads.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` (header only) |
//!
//! The module is split into:
//! - **Backend**: [`ImageProbe`] trait + [`Dimensions`]
//! - **Rust backend**: [`ImageCrateProbe`], the production implementation

pub mod backend;
pub mod rust_backend;

pub use backend::{Dimensions, ImageProbe, ProbeError};
pub use rust_backend::{ImageCrateProbe, supported_input_extensions};
