//! Citation link extraction from page annotations.
//!
//! An annotation qualifies only if it is a link annotation that carries a
//! destination and no external URL: internal citations only. Whole-document
//! extraction walks pages in ascending order, so link ids are stable and
//! monotonic in page order — consumers rely on that.

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::document::{DocumentError, SourceDocument};
use crate::geometry;
use crate::types::CitationLink;

/// Extract internal citation links from one page.
pub fn extract_page_links(
    doc: &impl SourceDocument,
    page_number: u32,
) -> Result<Vec<CitationLink>, DocumentError> {
    let viewport = doc.viewport(page_number, 1.0)?;
    let annotations = doc.annotations(page_number)?;

    let mut links = Vec::new();
    for annotation in annotations {
        if !annotation.is_citation_link() {
            continue;
        }
        let Some(dest) = annotation.dest else {
            continue;
        };
        let bounds = match geometry::rect_to_viewport(&annotation.rect, &viewport) {
            Ok(bounds) => bounds,
            Err(e) => {
                warn!("skipping annotation on page {page_number}: {e}");
                continue;
            }
        };
        let rect = [
            annotation.rect[0],
            annotation.rect[1],
            annotation.rect[2],
            annotation.rect[3],
        ];
        links.push(CitationLink {
            id: format!("link-{page_number}-{}", links.len()),
            rect,
            dest,
            source_page: page_number,
            bounds,
        });
    }
    Ok(links)
}

/// Extract citation links for the whole document, pages 1..N strictly in
/// order. Cancellation is checked between pages; a cancelled extraction
/// returns the links collected so far.
pub fn extract_all_links(
    doc: &impl SourceDocument,
    cancel: &CancellationToken,
) -> Result<Vec<CitationLink>, DocumentError> {
    let mut links = Vec::new();
    for page_number in 1..=doc.page_count() as u32 {
        if cancel.is_cancelled() {
            debug!("link extraction cancelled at page {page_number}");
            break;
        }
        links.extend(extract_page_links(doc, page_number)?);
    }
    Ok(links)
}
