//! Decoding signature rasters for embedding as PDF image XObjects

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::PdfError;

/// Color space of the decoded pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorComponents {
    Gray,
    Rgb,
}

impl ColorComponents {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorComponents::Gray => "DeviceGray",
            ColorComponents::Rgb => "DeviceRGB",
        }
    }
}

/// An 8-bit raster split into color samples and an optional alpha channel
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub components: ColorComponents,
    pub color: Vec<u8>,
    /// `None` when every pixel is fully opaque
    pub alpha: Option<Vec<u8>>,
}

impl RasterImage {
    /// Decode PNG bytes (any bit depth or color type) into 8-bit samples
    pub fn from_png(bytes: &[u8]) -> Result<Self, PdfError> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| PdfError::Image(format!("Failed to read PNG header: {}", e)))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| PdfError::Image(format!("Failed to decode PNG: {}", e)))?;
        buf.truncate(info.buffer_size());

        if info.width == 0 || info.height == 0 {
            return Err(PdfError::Image("PNG has no pixels".to_string()));
        }

        let (components, color, alpha) = match info.color_type {
            png::ColorType::Rgb => (ColorComponents::Rgb, buf, None),
            png::ColorType::Grayscale => (ColorComponents::Gray, buf, None),
            png::ColorType::Rgba => {
                let (color, alpha) = split_alpha(&buf, 3);
                (ColorComponents::Rgb, color, Some(alpha))
            }
            png::ColorType::GrayscaleAlpha => {
                let (color, alpha) = split_alpha(&buf, 1);
                (ColorComponents::Gray, color, Some(alpha))
            }
            png::ColorType::Indexed => {
                return Err(PdfError::Image(
                    "Indexed PNG was not expanded".to_string(),
                ))
            }
        };

        let alpha = alpha.filter(|a| a.iter().any(|v| *v != u8::MAX));

        Ok(Self {
            width: info.width,
            height: info.height,
            components,
            color,
            alpha,
        })
    }
}

/// Split interleaved samples into color and alpha planes
fn split_alpha(samples: &[u8], color_channels: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = color_channels + 1;
    let pixels = samples.len() / stride;
    let mut color = Vec::with_capacity(pixels * color_channels);
    let mut alpha = Vec::with_capacity(pixels);
    for px in samples.chunks_exact(stride) {
        color.extend_from_slice(&px[..color_channels]);
        alpha.push(px[color_channels]);
    }
    (color, alpha)
}

/// Zlib-compress a sample plane for a FlateDecode stream
pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfError::Image(format!("Failed to compress image: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| PdfError::Image(format!("Failed to compress image: {}", e)))
}
