//! Document accessor boundary.
//!
//! The engine never parses PDFs itself: a hosting viewer supplies pages,
//! annotations, text items, and destination lookups through the
//! [`SourceDocument`] trait. [`DocumentSnapshot`] is a serde-backed
//! in-memory implementation used by the CLI harness and the test suite.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Viewport;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("page {0} out of range")]
    PageOutOfRange(u32),
    #[error("document access failed: {0}")]
    Access(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An indirect reference identifying a page object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRef {
    pub obj: u32,
    #[serde(default)]
    pub r#gen: u16,
}

/// One entry of an explicit destination array.
///
/// The first entry identifies the page; the fourth (when present and
/// numeric) is a vertical offset in PDF units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DestEntry {
    Page(PageRef),
    Name(String),
    Num(f64),
    Null,
}

/// A link target: either a symbolic name resolved through the document's
/// name table, or an already-explicit destination array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Named(String),
    Explicit(Vec<DestEntry>),
}

/// A document-embedded annotation as exposed by the accessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub subtype: String,
    pub rect: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<Destination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Annotation {
    /// Internal citation links only: link subtype, carries a destination,
    /// and no external URL.
    pub fn is_citation_link(&self) -> bool {
        self.subtype == "Link" && self.dest.is_some() && self.url.is_none()
    }
}

/// A text item with its glyph baseline origin in PDF space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// Read-only access to a parsed document.
///
/// Page numbers are 1-based throughout. Implementations must not panic on
/// out-of-range pages; they return [`DocumentError::PageOutOfRange`].
pub trait SourceDocument {
    fn page_count(&self) -> usize;

    /// Annotations on a page, in document order.
    fn annotations(&self, page_number: u32) -> Result<Vec<Annotation>, DocumentError>;

    /// Text items on a page, in extraction order.
    fn text_items(&self, page_number: u32) -> Result<Vec<TextItem>, DocumentError>;

    /// The page's viewport (point-conversion transform included) at the
    /// given scale.
    fn viewport(&self, page_number: u32, scale: f64) -> Result<Viewport, DocumentError>;

    /// Resolve a symbolic destination name to its explicit array form.
    /// `Ok(None)` when the name is not in the document's name table.
    fn named_destination(&self, name: &str) -> Result<Option<Vec<DestEntry>>, DocumentError>;

    /// Resolve a page reference to its 0-based page index.
    fn page_index(&self, page: &PageRef) -> Result<Option<usize>, DocumentError>;
}

/// One page of a [`DocumentSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(rename = "ref")]
    pub page_ref: PageRef,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub text: Vec<TextItem>,
}

/// In-memory document loaded from a JSON dump of pages, annotations, text
/// items, and named destinations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub pages: Vec<PageSnapshot>,
    #[serde(default)]
    pub named_destinations: HashMap<String, Vec<DestEntry>>,
}

impl DocumentSnapshot {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::Access(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn page(&self, page_number: u32) -> Result<&PageSnapshot, DocumentError> {
        if page_number == 0 {
            return Err(DocumentError::PageOutOfRange(page_number));
        }
        self.pages
            .get(page_number as usize - 1)
            .ok_or(DocumentError::PageOutOfRange(page_number))
    }
}

impl SourceDocument for DocumentSnapshot {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn annotations(&self, page_number: u32) -> Result<Vec<Annotation>, DocumentError> {
        Ok(self.page(page_number)?.annotations.clone())
    }

    fn text_items(&self, page_number: u32) -> Result<Vec<TextItem>, DocumentError> {
        Ok(self.page(page_number)?.text.clone())
    }

    fn viewport(&self, page_number: u32, scale: f64) -> Result<Viewport, DocumentError> {
        let page = self.page(page_number)?;
        Ok(Viewport::new(page.width, page.height, scale, page.rotation))
    }

    fn named_destination(&self, name: &str) -> Result<Option<Vec<DestEntry>>, DocumentError> {
        Ok(self.named_destinations.get(name).cloned())
    }

    fn page_index(&self, page: &PageRef) -> Result<Option<usize>, DocumentError> {
        Ok(self.pages.iter().position(|p| p.page_ref == *page))
    }
}
