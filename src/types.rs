use serde::{Deserialize, Serialize};

/// A rectangle in viewport space: origin top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// An internal citation link discovered in a page's annotations.
///
/// `rect` is the raw annotation rectangle in PDF space; `bounds` is the
/// same rectangle mapped into viewport space at unit scale. Links are
/// immutable once produced by one extraction pass and recomputed wholesale
/// on re-extraction.
#[derive(Debug, Clone, Serialize)]
pub struct CitationLink {
    /// Stable within one pass: "link-{page}-{index}", monotonic in page order.
    pub id: String,
    pub rect: [f64; 4],
    pub dest: crate::document::Destination,
    /// 1-based page the annotation sits on.
    pub source_page: u32,
    pub bounds: Bounds,
}

/// Human-readable reference text reconstructed near a resolved destination.
/// Ephemeral: computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferencePreview {
    /// Capped at 500 characters.
    pub text: String,
    /// 1-based.
    pub page_number: u32,
}

/// A destination resolved to a concrete page and vertical offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDestination {
    /// 0-based page index.
    pub page_index: usize,
    /// Vertical offset in PDF units (0 when the destination omits it).
    pub target_offset: f64,
}

/// Citation marker style recognized by the pattern detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CitationKind {
    Inline,
    ReferenceNumber,
    Doi,
    Url,
}

impl CitationKind {
    /// Ranking priority: DOIs are the strongest signal, bare numbers the
    /// weakest.
    pub fn priority(self) -> u8 {
        match self {
            CitationKind::Doi => 4,
            CitationKind::Inline => 3,
            CitationKind::Url => 2,
            CitationKind::ReferenceNumber => 1,
        }
    }
}

/// A citation marker detected in extracted page text.
///
/// The collection for a page is fully rebuilt on each scan, never patched
/// incrementally.
#[derive(Debug, Clone, Serialize)]
pub struct DetectedCitation {
    /// Unique within one detection pass: "cite-{page}-{offset}-{pattern}".
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CitationKind,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Heuristic score in [0, 1]; used for ranking only.
    pub confidence: f64,
    pub page: u32,
    /// Screen position, filled in by the presentation layer when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Bounds>,
}

/// Provenance of a resolved PDF link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PdfLinkSource {
    Arxiv,
    Unpaywall,
    SemanticScholar,
    OpenAlex,
    NotFound,
}

/// Outcome of the open-access PDF resolution chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfLink {
    pub pdf_url: Option<String>,
    pub source: PdfLinkSource,
    pub is_open_access: bool,
}

impl PdfLink {
    pub fn not_found() -> Self {
        Self {
            pdf_url: None,
            source: PdfLinkSource::NotFound,
            is_open_access: false,
        }
    }
}

/// Bibliographic metadata used to drive PDF link resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitationMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Provenance of a term definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermSource {
    Dictionary,
    Encyclopedia,
    NotFound,
}

/// Resolved definition for a term, from the dictionary/encyclopedia chain.
/// Chain exhaustion yields a "not found" message, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct TermResolution {
    pub term: String,
    pub definition: String,
    pub source: TermSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}
