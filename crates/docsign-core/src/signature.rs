//! Signature image input

use base64::{engine::general_purpose::STANDARD, Engine};
use shared_pdf::RasterImage;

use crate::error::WorkflowError;

const DATA_URL_PREFIX: &str = "data:";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// A signature image that has been checked to decode as PNG
#[derive(Debug, Clone)]
pub struct SignatureImage {
    png: Vec<u8>,
    raster: RasterImage,
}

impl SignatureImage {
    /// Accept raw PNG bytes
    pub fn from_png(bytes: Vec<u8>) -> Result<Self, WorkflowError> {
        if bytes.is_empty() {
            return Err(WorkflowError::MissingSignatureImage);
        }
        if !bytes.starts_with(PNG_MAGIC) {
            return Err(WorkflowError::InvalidSignatureImage(
                "expected PNG data".to_string(),
            ));
        }
        let raster = RasterImage::from_png(&bytes)
            .map_err(|e| WorkflowError::InvalidSignatureImage(e.to_string()))?;
        Ok(Self { png: bytes, raster })
    }

    /// Accept a `data:image/png;base64,...` URL as produced by a drawing pad
    pub fn from_data_url(url: &str) -> Result<Self, WorkflowError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(WorkflowError::MissingSignatureImage);
        }
        let rest = url.strip_prefix(DATA_URL_PREFIX).ok_or_else(|| {
            WorkflowError::InvalidSignatureImage("not a data URL".to_string())
        })?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            WorkflowError::InvalidSignatureImage("data URL has no payload".to_string())
        })?;

        let mut parts = header.split(';');
        let mime = parts.next().unwrap_or_default();
        if !mime.eq_ignore_ascii_case("image/png") {
            return Err(WorkflowError::InvalidSignatureImage(format!(
                "unsupported image type: {}",
                mime
            )));
        }
        if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(WorkflowError::InvalidSignatureImage(
                "data URL is not base64 encoded".to_string(),
            ));
        }

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| WorkflowError::InvalidSignatureImage(e.to_string()))?;
        Self::from_png(bytes)
    }

    /// Accept either form: a data URL string or bare base64 PNG
    pub fn from_encoded(value: &str) -> Result<Self, WorkflowError> {
        let value = value.trim();
        if value.starts_with(DATA_URL_PREFIX) {
            return Self::from_data_url(value);
        }
        if value.is_empty() {
            return Err(WorkflowError::MissingSignatureImage);
        }
        let bytes = STANDARD
            .decode(value)
            .map_err(|e| WorkflowError::InvalidSignatureImage(e.to_string()))?;
        Self::from_png(bytes)
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn raster(&self) -> &RasterImage {
        &self.raster
    }

    pub fn width(&self) -> u32 {
        self.raster.width
    }

    pub fn height(&self) -> u32 {
        self.raster.height
    }
}
