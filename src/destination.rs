//! Destination resolution: symbolic name or explicit array to a concrete
//! page index and vertical offset.
//!
//! Every failure mode (unknown name, empty array, page lookup failure)
//! resolves to `None`; accessor errors are logged and never propagate past
//! this boundary.

use log::warn;

use crate::document::{DestEntry, Destination, SourceDocument};
use crate::types::ResolvedDestination;

/// Resolve a destination to a 0-based page index and a vertical offset in
/// PDF units. The offset defaults to 0 when the destination omits it.
pub fn resolve(doc: &impl SourceDocument, dest: &Destination) -> Option<ResolvedDestination> {
    let entries = match dest {
        Destination::Explicit(entries) => entries.clone(),
        Destination::Named(name) => match doc.named_destination(name) {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                warn!("named destination not found: {name}");
                return None;
            }
            Err(e) => {
                warn!("named destination lookup failed for {name}: {e}");
                return None;
            }
        },
    };

    if entries.is_empty() {
        warn!("destination resolved to an empty array");
        return None;
    }

    let DestEntry::Page(page_ref) = &entries[0] else {
        warn!("destination does not start with a page reference");
        return None;
    };

    let page_index = match doc.page_index(page_ref) {
        Ok(Some(index)) => index,
        Ok(None) => {
            warn!("page reference {page_ref:?} not found in document");
            return None;
        }
        Err(e) => {
            warn!("page index lookup failed: {e}");
            return None;
        }
    };

    let target_offset = match entries.get(3) {
        Some(DestEntry::Num(offset)) => *offset,
        _ => 0.0,
    };

    Some(ResolvedDestination {
        page_index,
        target_offset,
    })
}

/// Resolve a destination to its 1-based page number.
pub fn page_number(doc: &impl SourceDocument, dest: &Destination) -> Option<u32> {
    resolve(doc, dest).map(|r| r.page_index as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentSnapshot, PageRef, PageSnapshot};

    fn page(obj: u32) -> PageSnapshot {
        PageSnapshot {
            page_ref: PageRef { obj, r#gen: 0 },
            width: 612.0,
            height: 792.0,
            rotation: 0,
            annotations: vec![],
            text: vec![],
        }
    }

    fn doc_with_named(name: &str, entries: Vec<DestEntry>) -> DocumentSnapshot {
        let mut doc = DocumentSnapshot {
            pages: vec![page(3), page(7)],
            named_destinations: Default::default(),
        };
        doc.named_destinations.insert(name.to_string(), entries);
        doc
    }

    #[test]
    fn explicit_destination_resolves() {
        let doc = doc_with_named("unused", vec![]);
        let dest = Destination::Explicit(vec![
            DestEntry::Page(PageRef { obj: 7, r#gen: 0 }),
            DestEntry::Name("XYZ".into()),
            DestEntry::Num(0.0),
            DestEntry::Num(415.5),
        ]);
        let resolved = resolve(&doc, &dest).unwrap();
        assert_eq!(resolved.page_index, 1);
        assert_eq!(resolved.target_offset, 415.5);
        assert_eq!(page_number(&doc, &dest), Some(2));
    }

    #[test]
    fn named_destination_resolves_through_name_table() {
        let doc = doc_with_named(
            "cite.1",
            vec![
                DestEntry::Page(PageRef { obj: 3, r#gen: 0 }),
                DestEntry::Name("XYZ".into()),
                DestEntry::Num(0.0),
                DestEntry::Num(680.0),
                DestEntry::Null,
            ],
        );
        let resolved = resolve(&doc, &Destination::Named("cite.1".into())).unwrap();
        assert_eq!(resolved.page_index, 0);
        assert_eq!(resolved.target_offset, 680.0);
    }

    #[test]
    fn missing_offset_defaults_to_zero() {
        let doc = doc_with_named("unused", vec![]);
        let dest = Destination::Explicit(vec![DestEntry::Page(PageRef { obj: 3, r#gen: 0 })]);
        let resolved = resolve(&doc, &dest).unwrap();
        assert_eq!(resolved.target_offset, 0.0);
    }

    #[test]
    fn non_numeric_offset_defaults_to_zero() {
        let doc = doc_with_named("unused", vec![]);
        let dest = Destination::Explicit(vec![
            DestEntry::Page(PageRef { obj: 3, r#gen: 0 }),
            DestEntry::Name("FitH".into()),
            DestEntry::Null,
            DestEntry::Null,
        ]);
        assert_eq!(resolve(&doc, &dest).unwrap().target_offset, 0.0);
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        let doc = doc_with_named("cite.1", vec![]);
        assert!(resolve(&doc, &Destination::Named("nope".into())).is_none());
    }

    #[test]
    fn empty_array_resolves_to_none() {
        let doc = doc_with_named("cite.1", vec![]);
        assert!(resolve(&doc, &Destination::Named("cite.1".into())).is_none());
    }

    #[test]
    fn non_page_first_entry_resolves_to_none() {
        let doc = doc_with_named("unused", vec![]);
        let dest = Destination::Explicit(vec![DestEntry::Num(1.0)]);
        assert!(resolve(&doc, &dest).is_none());
    }

    #[test]
    fn dangling_page_ref_resolves_to_none() {
        let doc = doc_with_named("unused", vec![]);
        let dest = Destination::Explicit(vec![DestEntry::Page(PageRef { obj: 99, r#gen: 0 })]);
        assert!(resolve(&doc, &dest).is_none());
        assert!(page_number(&doc, &dest).is_none());
    }
}
