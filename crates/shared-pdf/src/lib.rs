//! Shared PDF handling utilities
//!
//! This crate provides PDF parsing, coordinate transformation, and
//! image stamping used by the signing workflow.

pub mod coords;
pub mod error;
pub mod image;
pub mod parser;
pub mod stamp;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use coords::{top_left_to_pdf, PdfRect};
pub use error::PdfError;
pub use image::RasterImage;
pub use parser::PdfDocument;
pub use stamp::EmbeddedImage;
