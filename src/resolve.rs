//! Metadata resolution: ordered fallback chains over external sources,
//! with success-only caching and in-flight request deduplication.
//!
//! Concurrent callers asking for the same cache key share a single chain
//! walk through a claimed-key map of shared futures; a second caller
//! awaits the same eventual result instead of issuing duplicate network
//! calls. Failed resolutions are never cached, so they stay retryable.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::sources::SourceClient;
use crate::types::{CitationMetadata, PdfLink, TermResolution, TermSource};

/// Title prefix length used for cache keys when no identifier is present.
const TITLE_KEY_CHARS: usize = 100;

/// Abstracts the two resolution chains so the deduplication and caching
/// machinery can be exercised without a network.
pub trait LookupChain: Send + Sync + 'static {
    fn resolve_term(
        &self,
        term: String,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, TermResolution>;

    fn resolve_pdf(
        &self,
        meta: CitationMetadata,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, PdfLink>;
}

impl LookupChain for SourceClient {
    fn resolve_term(
        &self,
        term: String,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, TermResolution> {
        let client = self.clone();
        async move { walk_term_chain(&client, &term, &cancel).await }.boxed()
    }

    fn resolve_pdf(
        &self,
        meta: CitationMetadata,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, PdfLink> {
        let client = self.clone();
        async move { walk_pdf_chain(&client, &meta, &cancel).await }.boxed()
    }
}

/// Dictionary first, encyclopedic summary second, "not found" message last.
/// Single-source failures fall through to the next source; only full
/// exhaustion produces the terminal message.
async fn walk_term_chain(
    client: &SourceClient,
    term: &str,
    cancel: &CancellationToken,
) -> TermResolution {
    if !cancel.is_cancelled() {
        if let Some(resolved) = client.dictionary_lookup(term).await {
            return resolved;
        }
        debug!("dictionary lookup empty for {term}, trying encyclopedia");
    }
    if !cancel.is_cancelled() {
        if let Some(resolved) = client.encyclopedia_lookup(term).await {
            return resolved;
        }
    }
    TermResolution {
        term: term.to_string(),
        definition: format!("No definition found for \"{term}\"."),
        source: TermSource::NotFound,
        part_of_speech: None,
        phonetic: None,
        example: None,
        synonyms: vec![],
    }
}

/// arXiv direct link, then Unpaywall, then Semantic Scholar, then OpenAlex.
/// Each source is attempted only when the previous one yielded nothing.
async fn walk_pdf_chain(
    client: &SourceClient,
    meta: &CitationMetadata,
    cancel: &CancellationToken,
) -> PdfLink {
    if cancel.is_cancelled() {
        return PdfLink::not_found();
    }
    if let Some(arxiv_id) = &meta.arxiv_id {
        return client.arxiv_pdf(arxiv_id);
    }
    if let Some(doi) = &meta.doi {
        if let Some(link) = client.unpaywall_pdf(doi).await {
            return link;
        }
        debug!("unpaywall had no PDF for {doi}");
    }
    if cancel.is_cancelled() {
        return PdfLink::not_found();
    }
    if let Some(link) = client.semantic_scholar_pdf(meta).await {
        return link;
    }
    if cancel.is_cancelled() {
        return PdfLink::not_found();
    }
    if let Some(link) = client.openalex_pdf(meta).await {
        return link;
    }
    PdfLink::not_found()
}

type SharedPdfFuture = Shared<BoxFuture<'static, PdfLink>>;

/// Resolves bibliographic metadata and open-access PDF links, caching
/// successful results per document context.
pub struct MetadataResolver {
    chain: Arc<dyn LookupChain>,
    pdf_cache: DashMap<String, PdfLink>,
    term_cache: DashMap<String, TermResolution>,
    in_flight: DashMap<String, SharedPdfFuture>,
    cancel: CancellationToken,
}

impl MetadataResolver {
    pub fn new(chain: Arc<dyn LookupChain>) -> Self {
        Self {
            chain,
            pdf_cache: DashMap::new(),
            term_cache: DashMap::new(),
            in_flight: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Cooperatively abandon outstanding lookups, e.g. when the hosting
    /// context switches documents. Late results are discarded and do not
    /// touch the caches.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolve a term definition through the dictionary/encyclopedia chain.
    /// Never fails: chain exhaustion yields a "not found" resolution.
    pub async fn resolve_term(&self, term: &str) -> TermResolution {
        let key = term.trim().to_lowercase();
        if let Some(hit) = self.term_cache.get(&key) {
            return hit.clone();
        }
        let resolved = self
            .chain
            .resolve_term(term.to_string(), self.cancel.clone())
            .await;
        if resolved.source != TermSource::NotFound && !self.cancel.is_cancelled() {
            self.term_cache.insert(key, resolved.clone());
        }
        resolved
    }

    /// Resolve an open-access PDF link for the given metadata.
    ///
    /// Concurrent calls with the same cache key share one chain walk.
    /// Only successful resolutions (non-null URL) enter the cache.
    pub async fn resolve_pdf_link(&self, meta: &CitationMetadata) -> PdfLink {
        let Some(key) = pdf_cache_key(meta) else {
            debug!("no usable cache key: metadata carries no identifier or title");
            return PdfLink::not_found();
        };
        if let Some(hit) = self.pdf_cache.get(&key) {
            return hit.clone();
        }

        let future = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let future = self
                    .chain
                    .resolve_pdf(meta.clone(), self.cancel.clone())
                    .shared();
                entry.insert(future.clone());
                future
            }
        };

        let result = future.await;
        self.in_flight.remove(&key);
        if result.pdf_url.is_some() && !self.cancel.is_cancelled() {
            self.pdf_cache.insert(key, result.clone());
        }
        result
    }

    /// Number of cached PDF link resolutions.
    pub fn cached_pdf_links(&self) -> usize {
        self.pdf_cache.len()
    }
}

/// Cache key precedence: arXiv id, else DOI, else normalized 100-char
/// title prefix. Metadata with none of the three is unresolvable.
fn pdf_cache_key(meta: &CitationMetadata) -> Option<String> {
    if let Some(arxiv_id) = &meta.arxiv_id {
        return Some(format!("arxiv:{arxiv_id}"));
    }
    if let Some(doi) = &meta.doi {
        return Some(format!("doi:{}", doi.to_lowercase()));
    }
    meta.title.as_ref().map(|title| {
        let normalized = crate::store::normalize_citation(title);
        let prefix: String = normalized.chars().take(TITLE_KEY_CHARS).collect();
        format!("title:{prefix}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PdfLinkSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Chain stub that counts walks and resolves after a short delay.
    struct CountingChain {
        walks: AtomicUsize,
        succeed: bool,
    }

    impl CountingChain {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                walks: AtomicUsize::new(0),
                succeed,
            })
        }
    }

    impl LookupChain for CountingChain {
        fn resolve_term(
            &self,
            term: String,
            _cancel: CancellationToken,
        ) -> BoxFuture<'static, TermResolution> {
            self.walks.fetch_add(1, Ordering::SeqCst);
            async move {
                TermResolution {
                    term,
                    definition: "a stub".into(),
                    source: TermSource::Dictionary,
                    part_of_speech: None,
                    phonetic: None,
                    example: None,
                    synonyms: vec![],
                }
            }
            .boxed()
        }

        fn resolve_pdf(
            &self,
            _meta: CitationMetadata,
            cancel: CancellationToken,
        ) -> BoxFuture<'static, PdfLink> {
            self.walks.fetch_add(1, Ordering::SeqCst);
            let succeed = self.succeed;
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                if cancel.is_cancelled() || !succeed {
                    PdfLink::not_found()
                } else {
                    PdfLink {
                        pdf_url: Some("https://example.org/paper.pdf".into()),
                        source: PdfLinkSource::Unpaywall,
                        is_open_access: true,
                    }
                }
            }
            .boxed()
        }
    }

    fn doi_meta() -> CitationMetadata {
        CitationMetadata {
            doi: Some("10.1145/3491102.3501968".into()),
            ..Default::default()
        }
    }

    #[test]
    fn cache_key_prefers_arxiv_then_doi_then_title() {
        let meta = CitationMetadata {
            doi: Some("10.1/X".into()),
            arxiv_id: Some("2004.12345".into()),
            title: Some("A Title".into()),
        };
        assert_eq!(pdf_cache_key(&meta).unwrap(), "arxiv:2004.12345");

        let meta = CitationMetadata {
            doi: Some("10.1/X".into()),
            arxiv_id: None,
            title: Some("A Title".into()),
        };
        assert_eq!(pdf_cache_key(&meta).unwrap(), "doi:10.1/x");

        let long_title = "Word ".repeat(40);
        let meta = CitationMetadata {
            doi: None,
            arxiv_id: None,
            title: Some(long_title),
        };
        let key = pdf_cache_key(&meta).unwrap();
        assert!(key.starts_with("title:word word"));
        assert_eq!(key.chars().count(), "title:".len() + TITLE_KEY_CHARS);

        assert!(pdf_cache_key(&CitationMetadata::default()).is_none());
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_chain_walk() {
        let chain = CountingChain::new(true);
        let resolver = MetadataResolver::new(chain.clone());
        let meta = doi_meta();

        let (a, b) = tokio::join!(
            resolver.resolve_pdf_link(&meta),
            resolver.resolve_pdf_link(&meta)
        );
        assert_eq!(a, b);
        assert!(a.pdf_url.is_some());
        assert_eq!(chain.walks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_resolution_is_cached() {
        let chain = CountingChain::new(true);
        let resolver = MetadataResolver::new(chain.clone());
        let meta = doi_meta();

        resolver.resolve_pdf_link(&meta).await;
        resolver.resolve_pdf_link(&meta).await;
        assert_eq!(chain.walks.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_pdf_links(), 1);
    }

    #[tokio::test]
    async fn failed_resolution_is_not_cached_and_retries() {
        let chain = CountingChain::new(false);
        let resolver = MetadataResolver::new(chain.clone());
        let meta = doi_meta();

        let first = resolver.resolve_pdf_link(&meta).await;
        assert_eq!(first.source, PdfLinkSource::NotFound);
        assert_eq!(resolver.cached_pdf_links(), 0);

        resolver.resolve_pdf_link(&meta).await;
        assert_eq!(chain.walks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_resolution_is_discarded() {
        let chain = CountingChain::new(true);
        let resolver = MetadataResolver::new(chain.clone());
        resolver.cancel();

        let result = resolver.resolve_pdf_link(&doi_meta()).await;
        assert!(result.pdf_url.is_none());
        assert_eq!(resolver.cached_pdf_links(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_resolve_independently() {
        let chain = CountingChain::new(true);
        let resolver = MetadataResolver::new(chain.clone());
        let other = CitationMetadata {
            doi: Some("10.5555/other".into()),
            ..Default::default()
        };

        let doi = doi_meta();
        let (a, b) = tokio::join!(
            resolver.resolve_pdf_link(&doi),
            resolver.resolve_pdf_link(&other)
        );
        assert!(a.pdf_url.is_some());
        assert!(b.pdf_url.is_some());
        assert_eq!(chain.walks.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached_pdf_links(), 2);
    }

    #[tokio::test]
    async fn term_resolution_caches_found_results() {
        let chain = CountingChain::new(true);
        let resolver = MetadataResolver::new(chain.clone());

        let first = resolver.resolve_term("Gradient").await;
        assert_eq!(first.source, TermSource::Dictionary);
        let _second = resolver.resolve_term("gradient").await;
        // Key is normalized, so the second call is a cache hit.
        assert_eq!(chain.walks.load(Ordering::SeqCst), 1);
    }
}
