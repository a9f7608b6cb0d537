//! Reference text reconstruction near a resolved destination.
//!
//! Best-effort: text items within a fixed vertical window of the target
//! offset are stitched back into reading order. The window and line
//! tolerance are deliberate heuristics, not derived from font metrics.

use log::warn;

use crate::destination;
use crate::document::{Destination, SourceDocument, TextItem};
use crate::types::ReferencePreview;

/// Vertical proximity window around the target offset, in viewport units.
const PROXIMITY_WINDOW: f64 = 50.0;

/// Y difference below which two items are treated as the same line.
const LINE_TOLERANCE: f64 = 5.0;

/// Maximum preview length in characters.
const MAX_PREVIEW_CHARS: usize = 500;

/// Reconstruct the reference text located near a destination.
///
/// Returns `None` when the destination does not resolve or the page cannot
/// be read; both are logged, neither raises.
pub fn reference_at(doc: &impl SourceDocument, dest: &Destination) -> Option<ReferencePreview> {
    let resolved = destination::resolve(doc, dest)?;
    let page_number = resolved.page_index as u32 + 1;

    let viewport = match doc.viewport(page_number, 1.0) {
        Ok(vp) => vp,
        Err(e) => {
            warn!("viewport unavailable for page {page_number}: {e}");
            return None;
        }
    };
    let items = match doc.text_items(page_number) {
        Ok(items) => items,
        Err(e) => {
            warn!("text items unavailable for page {page_number}: {e}");
            return None;
        }
    };

    let (_, target_y) = viewport.convert_to_viewport_point(0.0, resolved.target_offset);

    let mut nearby: Vec<&TextItem> = items
        .iter()
        .filter(|item| {
            let (_, vy) = viewport.convert_to_viewport_point(item.x, item.y);
            (vy - target_y).abs() <= PROXIMITY_WINDOW
        })
        .collect();

    // Reading order: PDF y grows upward, so earlier text has larger y.
    // Items within the line tolerance are ordered left to right instead.
    nearby.sort_by(|a, b| {
        if (a.y - b.y).abs() > LINE_TOLERANCE {
            b.y.total_cmp(&a.y)
        } else {
            a.x.total_cmp(&b.x)
        }
    });

    let joined = nearby
        .iter()
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    let text: String = collapsed.chars().take(MAX_PREVIEW_CHARS).collect();

    Some(ReferencePreview { text, page_number })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DestEntry, DocumentSnapshot, PageRef, PageSnapshot};

    fn item(text: &str, x: f64, y: f64) -> TextItem {
        TextItem {
            text: text.into(),
            x,
            y,
        }
    }

    fn doc_with_text(text: Vec<TextItem>) -> DocumentSnapshot {
        DocumentSnapshot {
            pages: vec![PageSnapshot {
                page_ref: PageRef { obj: 3, r#gen: 0 },
                width: 612.0,
                height: 792.0,
                rotation: 0,
                annotations: vec![],
                text,
            }],
            named_destinations: Default::default(),
        }
    }

    fn dest_at(offset: f64) -> Destination {
        Destination::Explicit(vec![
            DestEntry::Page(PageRef { obj: 3, r#gen: 0 }),
            DestEntry::Name("XYZ".into()),
            DestEntry::Num(0.0),
            DestEntry::Num(offset),
        ])
    }

    #[test]
    fn stitches_nearby_items_in_reading_order() {
        // Two lines: y=700 above y=688; within a line, left to right.
        let doc = doc_with_text(vec![
            item("Smith,", 72.0, 700.0),
            item("[12]", 52.0, 700.0),
            item("J. Machine Learning, 2020.", 72.0, 688.0),
        ]);
        let preview = reference_at(&doc, &dest_at(700.0)).unwrap();
        assert_eq!(preview.text, "[12] Smith, J. Machine Learning, 2020.");
        assert_eq!(preview.page_number, 1);
    }

    #[test]
    fn items_outside_window_are_excluded() {
        let doc = doc_with_text(vec![
            item("near", 72.0, 700.0),
            item("far above", 72.0, 760.0),
            item("far below", 72.0, 640.0),
        ]);
        let preview = reference_at(&doc, &dest_at(700.0)).unwrap();
        assert_eq!(preview.text, "near");
    }

    #[test]
    fn small_y_jitter_stays_on_one_line() {
        // 3-unit jitter is within the line tolerance: order by x.
        let doc = doc_with_text(vec![
            item("world", 120.0, 697.0),
            item("hello", 72.0, 700.0),
        ]);
        let preview = reference_at(&doc, &dest_at(700.0)).unwrap();
        assert_eq!(preview.text, "hello world");
    }

    #[test]
    fn whitespace_is_collapsed() {
        let doc = doc_with_text(vec![item("  a\t b ", 72.0, 700.0), item(" c ", 90.0, 700.0)]);
        let preview = reference_at(&doc, &dest_at(700.0)).unwrap();
        assert_eq!(preview.text, "a b c");
    }

    #[test]
    fn preview_is_capped_at_500_chars() {
        let long = "x".repeat(900);
        let doc = doc_with_text(vec![item(&long, 72.0, 700.0)]);
        let preview = reference_at(&doc, &dest_at(700.0)).unwrap();
        assert_eq!(preview.text.chars().count(), 500);
    }

    #[test]
    fn unresolvable_destination_returns_none() {
        let doc = doc_with_text(vec![item("text", 72.0, 700.0)]);
        assert!(reference_at(&doc, &Destination::Named("missing".into())).is_none());
    }

    #[test]
    fn empty_page_yields_empty_preview() {
        let doc = doc_with_text(vec![]);
        let preview = reference_at(&doc, &dest_at(700.0)).unwrap();
        assert_eq!(preview.text, "");
    }
}
