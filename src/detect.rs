//! Pattern-based citation marker detection over extracted page text.
//!
//! An ordered table of pattern definitions (matcher, kind, base confidence,
//! extractor) is processed by one uniform dispatch loop; adding a citation
//! style is a table change, not a control-flow change. Detection is purely
//! functional over the input text: no network, no storage.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::types::{CitationKind, DetectedCitation};

/// Characters stripped from the tail of DOI and URL matches.
const TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', ')', ']', '}', '>', '"', '\''];

static INLINE_TWO_AUTHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(([A-Z][\p{L}'’-]+)\s*(?:&|and)\s*([A-Z][\p{L}'’-]+),?\s*((?:19|20)\d{2})\)")
        .unwrap()
});

static INLINE_ET_AL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(([A-Z][\p{L}'’-]+)\s+et\s+al\.?,?\s*((?:19|20)\d{2})\)").unwrap()
});

static INLINE_SINGLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Z][\p{L}'’-]+),\s*((?:19|20)\d{2})\)").unwrap());

/// [1], [2-5], [1,3,5]. Up to 4 digits for review papers with 2000+ refs.
static BRACKET_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d{1,4}(?:\s*[-–]\s*\d{1,4})?(?:\s*,\s*\d{1,4}(?:\s*[-–]\s*\d{1,4})?)*)\]")
        .unwrap()
});

static SUPERSCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[⁰¹²³⁴⁵⁶⁷⁸⁹]+(?:\s*,\s*[⁰¹²³⁴⁵⁶⁷⁸⁹]+)*").unwrap());

static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\b10\.\d{4,9}/[^\s,;"']+"#).unwrap());

static ARXIV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"arXiv:\s*(\d{4}\.\d{4,5}(?:v\d+)?)|((?:hep|astro|cond|gr|math|nucl|physics|quant|cs|nlin|q-bio|q-fin|stat)(?:-[a-z]{2,3})?/\d{7}(?:v\d+)?)",
    )
    .unwrap()
});

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s,;]+").unwrap());

/// Fields pulled out of a single match by a pattern's extractor.
#[derive(Default)]
struct Extracted {
    /// Replaces the raw match as the citation text (e.g. punctuation-trimmed
    /// DOIs). Must be a prefix of the raw match when shorter.
    text: Option<String>,
    authors: Vec<String>,
    year: Option<i32>,
    doi: Option<String>,
    url: Option<String>,
}

struct PatternDef {
    kind: CitationKind,
    confidence: f64,
    regex: &'static Lazy<Regex>,
    extract: fn(&Captures) -> Extracted,
}

/// The ordered pattern table. Order defines pattern indices used in
/// citation ids; ranking is independent of table order.
static PATTERNS: &[PatternDef] = &[
    PatternDef {
        kind: CitationKind::Inline,
        confidence: 0.85,
        regex: &INLINE_TWO_AUTHOR_RE,
        extract: extract_two_author,
    },
    PatternDef {
        kind: CitationKind::Inline,
        confidence: 0.85,
        regex: &INLINE_ET_AL_RE,
        extract: extract_single_author,
    },
    PatternDef {
        kind: CitationKind::Inline,
        confidence: 0.9,
        regex: &INLINE_SINGLE_RE,
        extract: extract_single_author,
    },
    PatternDef {
        kind: CitationKind::ReferenceNumber,
        confidence: 0.8,
        regex: &BRACKET_NUMBER_RE,
        extract: extract_nothing,
    },
    PatternDef {
        kind: CitationKind::ReferenceNumber,
        confidence: 0.6,
        regex: &SUPERSCRIPT_RE,
        extract: extract_nothing,
    },
    PatternDef {
        kind: CitationKind::Doi,
        confidence: 0.95,
        regex: &DOI_RE,
        extract: extract_doi,
    },
    PatternDef {
        kind: CitationKind::Url,
        confidence: 0.9,
        regex: &ARXIV_RE,
        extract: extract_arxiv,
    },
    PatternDef {
        kind: CitationKind::Url,
        confidence: 0.7,
        regex: &URL_RE,
        extract: extract_url,
    },
];

fn extract_nothing(_caps: &Captures) -> Extracted {
    Extracted::default()
}

fn extract_single_author(caps: &Captures) -> Extracted {
    Extracted {
        authors: vec![caps[1].to_string()],
        year: caps[2].parse().ok(),
        ..Default::default()
    }
}

fn extract_two_author(caps: &Captures) -> Extracted {
    Extracted {
        authors: vec![caps[1].to_string(), caps[2].to_string()],
        year: caps[3].parse().ok(),
        ..Default::default()
    }
}

fn extract_doi(caps: &Captures) -> Extracted {
    let doi = caps[0].trim_end_matches(TRAILING_PUNCT).to_string();
    Extracted {
        text: Some(doi.clone()),
        url: Some(format!("https://doi.org/{doi}")),
        doi: Some(doi),
        ..Default::default()
    }
}

fn extract_arxiv(caps: &Captures) -> Extracted {
    let id = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Extracted {
        url: Some(format!("https://arxiv.org/abs/{id}")),
        ..Default::default()
    }
}

fn extract_url(caps: &Captures) -> Extracted {
    let url = caps[0].trim_end_matches(TRAILING_PUNCT).to_string();
    Extracted {
        text: Some(url.clone()),
        url: Some(url),
        ..Default::default()
    }
}

struct Candidate {
    start: usize,
    end: usize,
    pattern_index: usize,
    citation: DetectedCitation,
}

/// Detect citation markers in one page's extracted text.
///
/// Each pattern is applied independently and exhaustively. Overlapping
/// spans from different patterns are resolved in favour of the
/// higher-priority kind (longer span on ties); duplicate texts within page
/// distance 1 are dropped; the result is ranked by kind priority, then
/// confidence.
pub fn detect_citations(text: &str, page: u32) -> Vec<DetectedCitation> {
    let mut candidates = Vec::new();
    for (pattern_index, def) in PATTERNS.iter().enumerate() {
        for caps in def.regex.captures_iter(text) {
            let m = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let extracted = (def.extract)(&caps);
            let (citation_text, end) = match extracted.text {
                Some(t) => {
                    let end = m.start() + t.len().min(m.len());
                    (t, end)
                }
                None => (m.as_str().to_string(), m.end()),
            };
            candidates.push(Candidate {
                start: m.start(),
                end,
                pattern_index,
                citation: DetectedCitation {
                    id: format!("cite-{page}-{}-{pattern_index}", m.start()),
                    kind: def.kind,
                    text: citation_text,
                    authors: extracted.authors,
                    year: extracted.year,
                    doi: extracted.doi,
                    url: extracted.url,
                    confidence: def.confidence,
                    page,
                    position: None,
                },
            });
        }
    }

    // Rank first so the greedy overlap/dedup pass keeps the strongest
    // candidate for each span.
    candidates.sort_by(|a, b| {
        rank_key(&b.citation)
            .partial_cmp(&rank_key(&a.citation))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then((b.end - b.start).cmp(&(a.end - a.start)))
            .then(a.start.cmp(&b.start))
            .then(a.pattern_index.cmp(&b.pattern_index))
    });

    let mut accepted: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let overlaps = accepted
            .iter()
            .any(|a| candidate.start < a.end && candidate.end > a.start);
        let duplicate = accepted
            .iter()
            .any(|a| a.citation.text == candidate.citation.text);
        if !overlaps && !duplicate {
            accepted.push(candidate);
        }
    }

    accepted.into_iter().map(|c| c.citation).collect()
}

/// Merge ranked detections from multiple pages, dropping entries whose text
/// already appeared on a page within absolute distance 1.
pub fn dedup_citations(ranked: Vec<DetectedCitation>) -> Vec<DetectedCitation> {
    let mut accepted: Vec<DetectedCitation> = Vec::new();
    for citation in ranked {
        let duplicate = accepted.iter().any(|a| {
            a.text == citation.text && a.page.abs_diff(citation.page) <= 1
        });
        if !duplicate {
            accepted.push(citation);
        }
    }
    accepted
}

/// Sort detections by kind priority (doi > inline > url > reference-number)
/// then confidence, both descending.
pub fn rank_citations(citations: &mut [DetectedCitation]) {
    citations.sort_by(|a, b| {
        rank_key(b)
            .partial_cmp(&rank_key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn rank_key(c: &DetectedCitation) -> (u8, f64) {
    (c.kind.priority(), c.confidence)
}
