//! External lookup sources.
//!
//! Every function here is one step of an ordered fallback chain: it either
//! returns a usable result or `None`, and any transport or decoding failure
//! is logged and collapses to `None` so the caller can try the next source.

use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::types::{CitationMetadata, PdfLink, PdfLinkSource, TermResolution, TermSource};

const DICTIONARY_API: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";
const WIKIPEDIA_API: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
const UNPAYWALL_API: &str = "https://api.unpaywall.org/v2";
const SEMANTIC_SCHOLAR_API: &str = "https://api.semanticscholar.org/graph/v1";
const OPENALEX_API: &str = "https://api.openalex.org";

/// Encyclopedic summaries are trimmed to the first sentence or this many
/// characters, whichever comes first.
const SUMMARY_CHAR_LIMIT: usize = 200;

/// HTTP client shared by all lookup sources.
#[derive(Debug, Clone)]
pub struct SourceClient {
    client: reqwest::Client,
    /// Contact address sent to polite-pool APIs (Unpaywall, OpenAlex).
    mailto: String,
}

impl SourceClient {
    pub fn new(mailto: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("citelink/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            mailto: mailto.unwrap_or_else(|| "citelink@example.org".to_string()),
        })
    }

    async fn get_json(&self, url: &str) -> Option<Value> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("request failed for {url}: {e}");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("{url} returned status {}", response.status());
            return None;
        }
        match response.json().await {
            Ok(body) => Some(body),
            Err(e) => {
                debug!("failed to decode response from {url}: {e}");
                None
            }
        }
    }

    /// Structured dictionary lookup: definition, part of speech, synonyms,
    /// phonetic, example when available.
    pub async fn dictionary_lookup(&self, term: &str) -> Option<TermResolution> {
        let url = format!("{DICTIONARY_API}/{}", urlencoding::encode(term));
        let body = self.get_json(&url).await?;
        parse_dictionary_entry(term, &body)
    }

    /// Encyclopedic summary lookup, trimmed to the first sentence or 200
    /// characters. Disambiguation pages are skipped.
    pub async fn encyclopedia_lookup(&self, term: &str) -> Option<TermResolution> {
        let url = format!("{WIKIPEDIA_API}/{}", urlencoding::encode(term));
        let body = self.get_json(&url).await?;
        if body.get("type").and_then(Value::as_str) == Some("disambiguation") {
            debug!("skipping disambiguation page for {term}");
            return None;
        }
        let extract = body.get("extract").and_then(Value::as_str)?;
        if extract.is_empty() {
            return None;
        }
        Some(TermResolution {
            term: term.to_string(),
            definition: trim_summary(extract),
            source: TermSource::Encyclopedia,
            part_of_speech: None,
            phonetic: None,
            example: None,
            synonyms: vec![],
        })
    }

    /// Direct arXiv PDF link; no network round-trip needed.
    pub fn arxiv_pdf(&self, arxiv_id: &str) -> PdfLink {
        PdfLink {
            pdf_url: Some(format!("https://arxiv.org/pdf/{arxiv_id}")),
            source: PdfLinkSource::Arxiv,
            is_open_access: true,
        }
    }

    /// Open-access aggregator lookup by DOI.
    pub async fn unpaywall_pdf(&self, doi: &str) -> Option<PdfLink> {
        let url = format!("{UNPAYWALL_API}/{doi}?email={}", self.mailto);
        let body = self.get_json(&url).await?;
        let pdf_url = body
            .get("best_oa_location")
            .and_then(|loc| loc.get("url_for_pdf"))
            .and_then(Value::as_str)?;
        Some(PdfLink {
            pdf_url: Some(pdf_url.to_string()),
            source: PdfLinkSource::Unpaywall,
            is_open_access: body.get("is_oa").and_then(Value::as_bool).unwrap_or(true),
        })
    }

    /// Semantic index lookup by DOI or title search.
    pub async fn semantic_scholar_pdf(&self, meta: &CitationMetadata) -> Option<PdfLink> {
        let fields = "openAccessPdf,isOpenAccess";
        let work = if let Some(doi) = &meta.doi {
            let url = format!("{SEMANTIC_SCHOLAR_API}/paper/DOI:{doi}?fields={fields}");
            self.get_json(&url).await?
        } else {
            let title = meta.title.as_deref()?;
            let url = format!(
                "{SEMANTIC_SCHOLAR_API}/paper/search?query={}&fields={fields}&limit=1",
                urlencoding::encode(title)
            );
            let body = self.get_json(&url).await?;
            body.get("data")?.get(0)?.clone()
        };
        let pdf_url = work
            .get("openAccessPdf")
            .and_then(|p| p.get("url"))
            .and_then(Value::as_str)?;
        Some(PdfLink {
            pdf_url: Some(pdf_url.to_string()),
            source: PdfLinkSource::SemanticScholar,
            is_open_access: work
                .get("isOpenAccess")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        })
    }

    /// Citation-graph registry lookup by DOI or title search.
    pub async fn openalex_pdf(&self, meta: &CitationMetadata) -> Option<PdfLink> {
        let work = if let Some(doi) = &meta.doi {
            let url = format!(
                "{OPENALEX_API}/works/https://doi.org/{doi}?mailto={}",
                self.mailto
            );
            self.get_json(&url).await?
        } else {
            let title = meta.title.as_deref()?;
            let url = format!(
                "{OPENALEX_API}/works?filter=title.search:{}&per-page=1&mailto={}",
                urlencoding::encode(title),
                self.mailto
            );
            let body = self.get_json(&url).await?;
            body.get("results")?.get(0)?.clone()
        };
        let pdf_url = work
            .get("best_oa_location")
            .and_then(|loc| loc.get("pdf_url"))
            .and_then(Value::as_str)?;
        Some(PdfLink {
            pdf_url: Some(pdf_url.to_string()),
            source: PdfLinkSource::OpenAlex,
            is_open_access: work
                .get("open_access")
                .and_then(|oa| oa.get("is_oa"))
                .and_then(Value::as_bool)
                .unwrap_or(true),
        })
    }
}

fn parse_dictionary_entry(term: &str, body: &Value) -> Option<TermResolution> {
    let entry = body.get(0)?;
    let meaning = entry.get("meanings")?.get(0)?;
    let first_def = meaning.get("definitions")?.get(0)?;
    let definition = first_def.get("definition")?.as_str()?.to_string();

    let mut synonyms: Vec<String> = meaning
        .get("synonyms")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    synonyms.truncate(5);

    Some(TermResolution {
        term: term.to_string(),
        definition,
        source: TermSource::Dictionary,
        part_of_speech: meaning
            .get("partOfSpeech")
            .and_then(Value::as_str)
            .map(str::to_string),
        phonetic: entry
            .get("phonetic")
            .and_then(Value::as_str)
            .map(str::to_string),
        example: first_def
            .get("example")
            .and_then(Value::as_str)
            .map(str::to_string),
        synonyms,
    })
}

/// First sentence, or the first 200 characters when no sentence boundary
/// shows up early enough.
fn trim_summary(extract: &str) -> String {
    let mut boundary = None;
    for (i, c) in extract.char_indices() {
        if c == '.' {
            let next = extract[i + 1..].chars().next();
            if next.is_none() || next == Some(' ') {
                boundary = Some(i + 1);
                break;
            }
        }
    }
    let sentence = boundary.map(|end| &extract[..end]).unwrap_or(extract);
    if sentence.chars().count() <= SUMMARY_CHAR_LIMIT {
        sentence.to_string()
    } else {
        sentence.chars().take(SUMMARY_CHAR_LIMIT).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dictionary_entry_parses_fields() {
        let body = json!([{
            "word": "citation",
            "phonetic": "/saɪˈteɪʃən/",
            "meanings": [{
                "partOfSpeech": "noun",
                "definitions": [{
                    "definition": "A reference to a source.",
                    "example": "The citation was incomplete."
                }],
                "synonyms": ["reference", "quotation"]
            }]
        }]);
        let resolved = parse_dictionary_entry("citation", &body).unwrap();
        assert_eq!(resolved.source, TermSource::Dictionary);
        assert_eq!(resolved.definition, "A reference to a source.");
        assert_eq!(resolved.part_of_speech.as_deref(), Some("noun"));
        assert_eq!(resolved.phonetic.as_deref(), Some("/saɪˈteɪʃən/"));
        assert_eq!(resolved.example.as_deref(), Some("The citation was incomplete."));
        assert_eq!(resolved.synonyms, vec!["reference", "quotation"]);
    }

    #[test]
    fn dictionary_entry_without_definitions_is_none() {
        let body = json!([{"word": "x", "meanings": []}]);
        assert!(parse_dictionary_entry("x", &body).is_none());
    }

    #[test]
    fn summary_trims_to_first_sentence() {
        let trimmed = trim_summary("Short sentence. More text follows here.");
        assert_eq!(trimmed, "Short sentence.");
    }

    #[test]
    fn summary_does_not_split_on_embedded_dots() {
        let trimmed = trim_summary("The v1.5 model works. Second sentence.");
        assert_eq!(trimmed, "The v1.5 model works.");
    }

    #[test]
    fn summary_falls_back_to_char_limit() {
        let long = "word ".repeat(100);
        let trimmed = trim_summary(&long);
        assert_eq!(trimmed.chars().count(), SUMMARY_CHAR_LIMIT);
    }

    #[test]
    fn arxiv_pdf_is_direct_and_open_access() {
        let client = SourceClient::new(None).unwrap();
        let link = client.arxiv_pdf("2004.12345");
        assert_eq!(link.pdf_url.as_deref(), Some("https://arxiv.org/pdf/2004.12345"));
        assert_eq!(link.source, PdfLinkSource::Arxiv);
        assert!(link.is_open_access);
    }

}
