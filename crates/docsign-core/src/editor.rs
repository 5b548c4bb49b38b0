//! Interactive placement editing for one recipient
//!
//! The editor receives positions in rendered pixels (clicks, drags,
//! resizes) and stores canonical ratios. Rendered page sizes are recorded as
//! pages are displayed; a pixel value for a page that has not been rendered
//! yet cannot be converted and is ignored.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::model::Placement;
use crate::placement::{self, Geometry, PageSize, MIN_HEIGHT_RATIO, MIN_WIDTH_RATIO};

#[derive(Debug, Error, PartialEq)]
pub enum PlacementError {
    #[error("No placement at index {index} (have {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Page numbers start at 1, got {0}")]
    InvalidPage(u32),

    #[error("Rendered page size must be positive, got {width}x{height}")]
    InvalidRenderSize { width: f64, height: f64 },
}

/// Partial edit of a placement. Values above 1 are pixels, others ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlacementUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct PlacementEditor {
    placements: Vec<Placement>,
    selected: Option<usize>,
    rendered: HashMap<u32, PageSize>,
}

impl PlacementEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume editing an existing list, nothing selected
    pub fn with_placements(placements: Vec<Placement>) -> Self {
        Self {
            placements,
            ..Self::default()
        }
    }

    /// Remember the pixel size a page was displayed at
    pub fn record_render(&mut self, page: u32, width: f64, height: f64) -> Result<(), PlacementError> {
        let size = PageSize::new(width, height)
            .ok_or(PlacementError::InvalidRenderSize { width, height })?;
        self.rendered.insert(page, size);
        Ok(())
    }

    pub fn rendered_size(&self, page: u32) -> Option<PageSize> {
        self.rendered.get(&page).copied()
    }

    /// Drop a default-sized box centered on a click and select it
    pub fn add_placement(
        &mut self,
        page: u32,
        click_x: f64,
        click_y: f64,
        rendered_width: f64,
        rendered_height: f64,
    ) -> Result<&Placement, PlacementError> {
        if page == 0 {
            return Err(PlacementError::InvalidPage(page));
        }
        self.record_render(page, rendered_width, rendered_height)?;
        let size = self
            .rendered_size(page)
            .ok_or(PlacementError::InvalidRenderSize {
                width: rendered_width,
                height: rendered_height,
            })?;

        let geometry = placement::box_at_click(click_x, click_y, size);
        self.placements.push(geometry.into_placement(page));
        let index = self.placements.len() - 1;
        self.selected = Some(index);
        Ok(&self.placements[index])
    }

    /// Apply a move/resize and re-clamp the whole box
    pub fn update_placement(
        &mut self,
        index: usize,
        update: PlacementUpdate,
    ) -> Result<&Placement, PlacementError> {
        let len = self.placements.len();
        let current = *self
            .placements
            .get(index)
            .ok_or(PlacementError::IndexOutOfRange { index, len })?;

        let page = match update.page {
            Some(0) => return Err(PlacementError::InvalidPage(0)),
            Some(p) => p,
            None => current.page,
        };
        let size = self.rendered_size(page);
        let page_w = size.map(|s| s.width);
        let page_h = size.map(|s| s.height);

        let edited = |new: Option<f64>, old: Option<f64>, dimension: Option<f64>| {
            new.and_then(|v| placement::to_ratio(v, dimension))
                .or_else(|| old.and_then(|v| placement::to_ratio(v, dimension)))
        };

        let width = edited(update.width, current.width, page_w);
        let height = edited(update.height, current.height, page_h);
        let x = edited(update.x, Some(current.x), page_w);
        let y = edited(update.y, Some(current.y), page_h);

        // pixel geometry on a page that was never rendered has no ratio yet
        let unresolved = |value: Option<f64>, new: Option<f64>, old: Option<f64>| {
            value.is_none() && (new.is_some() || old.is_some())
        };
        if x.is_none()
            || y.is_none()
            || unresolved(width, update.width, current.width)
            || unresolved(height, update.height, current.height)
        {
            debug!(index, page, "Placement update left unchanged until the page is rendered");
            return Ok(&self.placements[index]);
        }

        let (x, y) = (x.unwrap_or_default(), y.unwrap_or_default());
        let width = width.unwrap_or(MIN_WIDTH_RATIO);
        let height = height.unwrap_or(MIN_HEIGHT_RATIO);
        let geometry = placement::canonicalize(x, y, width, height);
        self.placements[index] = geometry.into_placement(page);
        Ok(&self.placements[index])
    }

    /// Remove a box, keeping the selection on the same box where it survives
    pub fn remove_placement(&mut self, index: usize) -> Result<Placement, PlacementError> {
        let len = self.placements.len();
        if index >= len {
            return Err(PlacementError::IndexOutOfRange { index, len });
        }
        let removed = self.placements.remove(index);
        self.selected = match self.selected {
            Some(s) if s == index => None,
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
        Ok(removed)
    }

    pub fn select(&mut self, index: usize) -> Result<(), PlacementError> {
        let len = self.placements.len();
        if index >= len {
            return Err(PlacementError::IndexOutOfRange { index, len });
        }
        self.selected = Some(index);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Display geometry of the boxes on a page, with their list indices.
    /// Empty until the page has been rendered.
    pub fn placements_on_page(&self, page: u32) -> Vec<(usize, Geometry)> {
        let Some(size) = self.rendered_size(page) else {
            return Vec::new();
        };
        self.placements
            .iter()
            .enumerate()
            .filter(|(_, p)| p.page == page)
            .map(|(i, p)| (i, placement::normalize_for_page(p, size)))
            .collect()
    }

    pub fn into_placements(self) -> Vec<Placement> {
        self.placements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::{EDGE_TOLERANCE, MAX_WIDTH_RATIO};
    use pretty_assertions::assert_eq;

    fn editor_with_box() -> PlacementEditor {
        let mut editor = PlacementEditor::new();
        editor.add_placement(1, 350.0, 453.0, 700.0, 906.0).unwrap();
        editor
    }

    #[test]
    fn test_add_selects_new_box() {
        let mut editor = editor_with_box();
        assert_eq!(editor.selected(), Some(0));
        editor.add_placement(1, 100.0, 100.0, 700.0, 906.0).unwrap();
        assert_eq!(editor.selected(), Some(1));
        assert_eq!(editor.placements().len(), 2);
    }

    #[test]
    fn test_add_rejects_page_zero() {
        let mut editor = PlacementEditor::new();
        assert_eq!(
            editor.add_placement(0, 1.0, 1.0, 700.0, 906.0).unwrap_err(),
            PlacementError::InvalidPage(0)
        );
    }

    #[test]
    fn test_update_in_pixels_converts_to_ratio() {
        let mut editor = editor_with_box();
        let p = *editor
            .update_placement(
                0,
                PlacementUpdate {
                    x: Some(70.0),
                    width: Some(210.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(p.x, 0.1);
        assert_eq!(p.width, Some(0.3));
    }

    #[test]
    fn test_update_drags_are_clamped() {
        let mut editor = editor_with_box();
        let p = *editor
            .update_placement(
                0,
                PlacementUpdate {
                    x: Some(0.99),
                    y: Some(0.99),
                    width: Some(0.9),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(p.width, Some(MAX_WIDTH_RATIO));
        assert!(p.x + MAX_WIDTH_RATIO <= 1.0 + EDGE_TOLERANCE);
        assert!(p.y + p.height.unwrap() <= 1.0 + EDGE_TOLERANCE);
    }

    #[test]
    fn test_pixel_update_on_unrendered_page_is_dropped() {
        let mut editor = editor_with_box();
        let before = editor.placements()[0];
        let after = *editor
            .update_placement(
                0,
                PlacementUpdate {
                    page: Some(2),
                    x: Some(0.1),
                    width: Some(300.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(after.page, 2);
        assert_eq!(after.x, 0.1);
        assert_eq!(after.width, before.width);
    }

    #[test]
    fn test_legacy_box_waits_for_render() {
        let legacy = Placement::new(1, 300.0, 400.0, 150.0, 60.0);
        let mut editor = PlacementEditor::with_placements(vec![legacy]);
        let update = PlacementUpdate {
            y: Some(0.5),
            ..Default::default()
        };

        let unchanged = *editor.update_placement(0, update).unwrap();
        assert_eq!(unchanged, legacy);

        editor.record_render(1, 600.0, 800.0).unwrap();
        let p = *editor.update_placement(0, update).unwrap();
        assert_eq!(p.x, 0.5);
        assert_eq!(p.y, 0.5);
        assert_eq!(p.width, Some(0.25));
        assert_eq!(p.height, Some(0.075));
    }

    #[test]
    fn test_update_out_of_range() {
        let mut editor = editor_with_box();
        assert_eq!(
            editor.update_placement(3, PlacementUpdate::default()).unwrap_err(),
            PlacementError::IndexOutOfRange { index: 3, len: 1 }
        );
    }

    #[test]
    fn test_remove_adjusts_selection() {
        let mut editor = PlacementEditor::new();
        for i in 0..3 {
            editor
                .add_placement(1, 100.0 + i as f64, 100.0, 700.0, 906.0)
                .unwrap();
        }

        // removing the selected box clears the selection
        editor.select(1).unwrap();
        editor.remove_placement(1).unwrap();
        assert_eq!(editor.selected(), None);

        // removing a lower index shifts the selection down
        editor.select(1).unwrap();
        editor.remove_placement(0).unwrap();
        assert_eq!(editor.selected(), Some(0));

        // removing a higher index leaves it alone
        editor.add_placement(1, 50.0, 50.0, 700.0, 906.0).unwrap();
        editor.select(0).unwrap();
        editor.remove_placement(1).unwrap();
        assert_eq!(editor.selected(), Some(0));
    }

    #[test]
    fn test_placements_on_page_resolves_legacy_boxes() {
        let legacy = Placement {
            page: 1,
            x: 70.0,
            y: 90.6,
            width: None,
            height: None,
        };
        let mut editor =
            PlacementEditor::with_placements(vec![legacy, Placement::new(2, 0.1, 0.1, 0.2, 0.1)]);
        assert!(editor.placements_on_page(1).is_empty());

        editor.record_render(1, 700.0, 906.0).unwrap();
        let shown = editor.placements_on_page(1);
        assert_eq!(shown.len(), 1);
        let (index, g) = shown[0];
        assert_eq!(index, 0);
        assert_eq!(g.x, 0.1);
        assert_eq!(g.y, 0.1);
        assert_eq!(g.width, placement::round_ratio(150.0 / 700.0));
    }

    #[test]
    fn test_record_render_rejects_empty_size() {
        let mut editor = PlacementEditor::new();
        assert!(editor.record_render(1, 0.0, 100.0).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Whatever sequence of edits is applied, boxes stay canonical
        #[test]
        fn edits_keep_boxes_canonical(
            click in (0.0f64..800.0, 0.0f64..1000.0),
            edits in proptest::collection::vec(
                (
                    proptest::option::of(-50.0f64..900.0),
                    proptest::option::of(-50.0f64..900.0),
                    proptest::option::of(0.0f64..900.0),
                    proptest::option::of(0.0f64..900.0),
                ),
                0..8,
            ),
        ) {
            let mut editor = PlacementEditor::new();
            editor.add_placement(1, click.0, click.1, 800.0, 1000.0).unwrap();
            for (x, y, width, height) in edits {
                editor
                    .update_placement(0, PlacementUpdate { x, y, width, height, page: None })
                    .unwrap();
            }
            let p = editor.placements()[0];
            let g = Geometry {
                x: p.x,
                y: p.y,
                width: p.width.unwrap(),
                height: p.height.unwrap(),
            };
            prop_assert!(g.is_canonical(), "{:?}", g);
        }
    }
}
