//! Burning a signature image into a PDF at its placements
//!
//! This is the CPU-bound half of signing; storage and versioning happen in
//! [`crate::workflow`].

use shared_pdf::{top_left_to_pdf, PdfDocument};
use tracing::{debug, warn};

use crate::error::WorkflowError;
use crate::model::Placement;
use crate::placement::{self, PageSize};
use crate::signature::SignatureImage;

/// Why a placement was not drawn
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    PageMissing { page: u32, page_count: usize },
    InvalidGeometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPlacement {
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct CompositeOutput {
    pub pdf: Vec<u8>,
    pub applied: usize,
    pub skipped: Vec<SkippedPlacement>,
}

/// MediaBox width and height of every page, in page order
pub fn page_sizes(pdf: &[u8]) -> Result<Vec<PageSize>, WorkflowError> {
    let doc = PdfDocument::from_bytes(pdf)?;
    (1..=doc.page_count() as u32)
        .map(|page| {
            let [_, _, width, height] = doc.page_dimensions(page)?;
            PageSize::new(width, height).ok_or_else(|| {
                WorkflowError::InvalidRequest(format!("page {} has an empty MediaBox", page))
            })
        })
        .collect()
}

/// Draw `image` at every placement that resolves to a real page.
///
/// Fails with [`WorkflowError::InvalidPlacement`] when nothing was drawn.
pub fn composite(
    base_pdf: &[u8],
    image: &SignatureImage,
    placements: &[Placement],
) -> Result<CompositeOutput, WorkflowError> {
    if placements.is_empty() {
        return Err(WorkflowError::InvalidPlacement(
            "no signature placements were supplied".to_string(),
        ));
    }

    let mut doc = PdfDocument::from_bytes(base_pdf)?;
    let page_count = doc.page_count();
    let embedded = doc.embed_image(image.raster())?;

    let mut applied = 0;
    let mut skipped = Vec::new();

    for (index, p) in placements.iter().enumerate() {
        if p.page == 0 || p.page as usize > page_count {
            warn!(index, page = p.page, page_count, "Skipping placement on missing page");
            skipped.push(SkippedPlacement {
                index,
                reason: SkipReason::PageMissing {
                    page: p.page,
                    page_count,
                },
            });
            continue;
        }

        let media_box = doc.page_dimensions(p.page)?;
        let resolved = PageSize::new(media_box[2], media_box[3])
            .and_then(|size| placement::resolve_absolute(p, size));
        let Some(abs) = resolved else {
            warn!(index, page = p.page, "Skipping placement with unusable geometry");
            skipped.push(SkippedPlacement {
                index,
                reason: SkipReason::InvalidGeometry,
            });
            continue;
        };

        let rect = top_left_to_pdf(abs.left, abs.top, abs.width, abs.height, media_box);
        debug!(index, page = p.page, x = rect.x, y = rect.y, "Drawing signature");
        doc.draw_image(p.page, &embedded, rect)?;
        applied += 1;
    }

    if applied == 0 {
        return Err(WorkflowError::InvalidPlacement(
            "no signature placement could be applied to the document".to_string(),
        ));
    }

    Ok(CompositeOutput {
        pdf: doc.save_to_bytes()?,
        applied,
        skipped,
    })
}
