//! PDF parsing and manipulation using lopdf

use std::collections::BTreeSet;

use lopdf::{Document, Object, ObjectId};

use crate::error::PdfError;

/// US Letter, used when neither the page nor its parents carry a MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Wrapper around lopdf::Document
pub struct PdfDocument {
    pub(crate) doc: Document,
    /// Pages whose original content has already been isolated in `q ... Q`
    pub(crate) wrapped_pages: BTreeSet<ObjectId>,
}

impl PdfDocument {
    /// Load a PDF from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;
        Ok(Self {
            doc,
            wrapped_pages: BTreeSet::new(),
        })
    }

    /// Get the number of pages
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Get page object ID for a given page number (1-indexed)
    pub fn page_id(&self, page_num: u32) -> Option<ObjectId> {
        self.doc.get_pages().get(&page_num).copied()
    }

    /// Get page dimensions (MediaBox) as [x, y, width, height]
    pub fn page_dimensions(&self, page_num: u32) -> Result<[f64; 4], PdfError> {
        let page_id = self
            .page_id(page_num)
            .ok_or(PdfError::PageNotFound(page_num))?;

        let page_dict = self.doc.get_object(page_id)?.as_dict()?;
        self.get_media_box(page_dict)
    }

    /// Extract MediaBox from page dictionary, walking up the page tree if needed
    fn get_media_box(&self, page_dict: &lopdf::Dictionary) -> Result<[f64; 4], PdfError> {
        let mut current = page_dict;
        // Page trees are shallow; the bound guards against reference cycles.
        for _ in 0..32 {
            if let Ok(media_box) = current.get(b"MediaBox") {
                return self.parse_rect(media_box);
            }
            let parent = current
                .get(b"Parent")
                .and_then(Object::as_reference)
                .and_then(|id| self.doc.get_object(id))
                .and_then(Object::as_dict);
            match parent {
                Ok(parent_dict) => current = parent_dict,
                Err(_) => break,
            }
        }

        Ok(DEFAULT_MEDIA_BOX)
    }

    /// Parse a PDF rectangle array into [x, y, width, height]
    pub(crate) fn parse_rect(&self, obj: &Object) -> Result<[f64; 4], PdfError> {
        let arr = match obj {
            Object::Array(a) => a,
            Object::Reference(id) => self.doc.get_object(*id)?.as_array()?,
            _ => return Err(PdfError::Parse("MediaBox is not an array".to_string())),
        };

        if arr.len() != 4 {
            return Err(PdfError::Parse(format!(
                "MediaBox has {} elements, expected 4",
                arr.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (i, obj) in arr.iter().enumerate() {
            values[i] = self.extract_number(obj)?;
        }

        // Normalize [x1, y1, x2, y2] (corners may be given in any order)
        let (x1, x2) = (values[0].min(values[2]), values[0].max(values[2]));
        let (y1, y2) = (values[1].min(values[3]), values[1].max(values[3]));

        Ok([x1, y1, x2 - x1, y2 - y1])
    }

    /// Extract a number from a PDF object
    pub(crate) fn extract_number(&self, obj: &Object) -> Result<f64, PdfError> {
        match obj {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(r) => Ok(*r as f64),
            Object::Reference(id) => self.extract_number(self.doc.get_object(*id)?),
            _ => Err(PdfError::Parse("Expected number in rectangle".to_string())),
        }
    }

    /// Save the document to bytes
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Operation(format!("Failed to save PDF: {}", e)))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pdf_with_pages;

    #[test]
    fn test_from_bytes_valid_pdf() {
        let bytes = pdf_with_pages(&[[0, 0, 612, 792], [0, 0, 595, 842]]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 2);
        assert!(pdf.page_id(1).is_some());
        assert!(pdf.page_id(3).is_none());
    }

    #[test]
    fn test_from_bytes_html_fails() {
        // fetch() against an SPA can return the HTML fallback instead of the PDF
        let html_bytes = b"<!DOCTYPE html><html><head></head><body>Not a PDF</body></html>";
        let result = PdfDocument::from_bytes(html_bytes);
        assert!(matches!(result, Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_from_bytes_empty_fails() {
        assert!(PdfDocument::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_page_dimensions_per_page() {
        let bytes = pdf_with_pages(&[[0, 0, 612, 792], [0, 0, 595, 842]]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(pdf.page_dimensions(1).unwrap(), [0.0, 0.0, 612.0, 792.0]);
        assert_eq!(pdf.page_dimensions(2).unwrap(), [0.0, 0.0, 595.0, 842.0]);
        assert!(matches!(
            pdf.page_dimensions(9),
            Err(PdfError::PageNotFound(9))
        ));
    }

    #[test]
    fn test_parse_rect_array() {
        let bytes = pdf_with_pages(&[[0, 0, 612, 792]]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();

        let arr = Object::Array(vec![
            Object::Integer(10),
            Object::Integer(20),
            Object::Integer(622),
            Object::Integer(812),
        ]);

        let dims = pdf.parse_rect(&arr).unwrap();
        assert_eq!(dims, [10.0, 20.0, 612.0, 792.0]);
    }

    #[test]
    fn test_extract_number() {
        let bytes = pdf_with_pages(&[[0, 0, 612, 792]]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();

        assert_eq!(pdf.extract_number(&Object::Integer(42)).unwrap(), 42.0);
        assert!((pdf.extract_number(&Object::Real(1.234)).unwrap() - 1.234).abs() < 0.001);
        assert!(pdf.extract_number(&Object::Null).is_err());
    }
}
