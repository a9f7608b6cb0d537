mod destination;
mod detect;
mod document;
mod geometry;
mod links;
mod locate;
mod resolve;
mod sources;
mod store;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use document::{DocumentSnapshot, SourceDocument};
use resolve::MetadataResolver;
use sources::SourceClient;
use store::ReferenceStore;
use types::{CitationMetadata, DetectedCitation, ReferencePreview};

#[derive(Parser)]
#[command(name = "citelink", about = "Resolve citations and references in PDF documents")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract internal citation links from a document snapshot
    Links {
        /// Document snapshot (JSON) to process
        file: PathBuf,
    },
    /// Reconstruct the reference text behind each citation link
    Preview {
        /// Document snapshot (JSON) to process
        file: PathBuf,
    },
    /// Detect citation markers in the document's page text
    Detect {
        /// Document snapshot (JSON) to process
        file: PathBuf,
    },
    /// Look up a term definition
    Define {
        term: String,
        /// Contact address for polite-pool APIs
        #[arg(long, env = "CITELINK_MAILTO")]
        mailto: Option<String>,
    },
    /// Resolve an open-access PDF link for a citation
    PdfLink {
        #[arg(long)]
        doi: Option<String>,
        #[arg(long)]
        arxiv: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// Contact address for polite-pool APIs
        #[arg(long, env = "CITELINK_MAILTO")]
        mailto: Option<String>,
    },
    /// Show stored retrieval statistics for a document
    Stats {
        document_id: String,
        /// Include every stored reference record
        #[arg(long)]
        full: bool,
    },
    /// Delete stored documents older than the retention window
    Sweep {
        /// Retention window in days
        #[arg(long, default_value_t = store::DEFAULT_RETENTION_DAYS)]
        days: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Links { file } => {
            let doc = load_snapshot(&file)?;
            let links = links::extract_all_links(&doc, &CancellationToken::new())?;
            print_output(&links, cli.pretty)
        }
        Command::Preview { file } => {
            let doc = load_snapshot(&file)?;
            print_output(&build_previews(&doc)?, cli.pretty)
        }
        Command::Detect { file } => {
            let doc = load_snapshot(&file)?;
            print_output(&detect_document(&doc)?, cli.pretty)
        }
        Command::Define { term, mailto } => {
            let resolver = build_resolver(mailto)?;
            print_output(&resolver.resolve_term(&term).await, cli.pretty)
        }
        Command::PdfLink {
            doi,
            arxiv,
            title,
            mailto,
        } => {
            let resolver = build_resolver(mailto)?;
            let meta = CitationMetadata {
                doi,
                arxiv_id: arxiv,
                title,
            };
            print_output(&resolver.resolve_pdf_link(&meta).await, cli.pretty)
        }
        Command::Stats { document_id, full } => {
            let store = ReferenceStore::open_default()?;
            if full {
                let record = store
                    .document_record(&document_id)?
                    .with_context(|| format!("no stored document: {document_id}"))?;
                print_output(&record, cli.pretty)
            } else {
                print_output(&store.stats(&document_id)?, cli.pretty)
            }
        }
        Command::Sweep { days } => {
            let store = ReferenceStore::open_default()?;
            let swept = store.sweep_older_than(days)?;
            println!("removed {swept} document(s) older than {days} days");
            Ok(())
        }
    }
}

fn load_snapshot(file: &PathBuf) -> Result<DocumentSnapshot> {
    DocumentSnapshot::from_file(file)
        .with_context(|| format!("failed to load document snapshot: {}", file.display()))
}

fn build_resolver(mailto: Option<String>) -> Result<MetadataResolver> {
    let client = SourceClient::new(mailto).context("failed to build HTTP client")?;
    Ok(MetadataResolver::new(Arc::new(client)))
}

#[derive(Serialize)]
struct LinkPreview {
    id: String,
    source_page: u32,
    #[serde(flatten)]
    preview: ReferencePreview,
}

fn build_previews(doc: &DocumentSnapshot) -> Result<Vec<LinkPreview>> {
    let links = links::extract_all_links(doc, &CancellationToken::new())?;
    Ok(links
        .into_iter()
        .filter_map(|link| {
            locate::reference_at(doc, &link.dest).map(|preview| LinkPreview {
                id: link.id,
                source_page: link.source_page,
                preview,
            })
        })
        .collect())
}

fn detect_document(doc: &DocumentSnapshot) -> Result<Vec<DetectedCitation>> {
    let mut all = Vec::new();
    for page_number in 1..=doc.page_count() as u32 {
        let text = doc
            .text_items(page_number)?
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        all.extend(detect::detect_citations(&text, page_number));
    }
    detect::rank_citations(&mut all);
    Ok(detect::dedup_citations(all))
}

fn print_output<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
