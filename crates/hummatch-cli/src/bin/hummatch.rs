//! hummatch - Rank reference songs against a hummed query
//!
//! Usage: hummatch <query_audio_path> [--corpus <dir>] [--variant <id>] [--top-k <n>]
//!
//! Prints a JSON envelope on stdout; failures print `{"status": "failed"}`
//! and exit with status 1.

use anyhow::{Context, Result};
use clap::Parser;
use hummatch_cli::corpus::list_corpus;
use hummatch_cli::output::{print_failure, print_json, SearchOutput};
use hummatch_core::{settings::SETTINGS_FILE, HummatchSettings, SearchEngine};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "hummatch")]
#[command(about = "Match a hummed query against a directory of reference songs", long_about = None)]
struct Args {
    /// Query audio file path
    query_audio_path: String,

    /// Settings file
    #[arg(short, long, default_value = SETTINGS_FILE)]
    config: String,

    /// Reference song directory (overrides settings)
    #[arg(long)]
    corpus: Option<String>,

    /// Matching variant (overrides settings)
    #[arg(long)]
    variant: Option<String>,

    /// Number of results to return (overrides settings)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Worker threads (overrides settings)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    hummatch_cli::init_logging(args.verbose);

    match run_search(&args) {
        Ok(output) => print_json(&output),
        Err(e) => {
            log::error!("Search failed: {:#}", e);
            print_failure(&e);
            std::process::exit(1);
        }
    }
}

fn run_search(args: &Args) -> Result<SearchOutput> {
    let mut settings = HummatchSettings::load_or_default(Path::new(&args.config))?;
    if let Some(corpus) = &args.corpus {
        settings.search.corpus_directory = corpus.clone();
    }
    if let Some(variant) = &args.variant {
        settings.search.variant = variant.clone();
    }
    if let Some(top_k) = args.top_k {
        settings.search.top_k = top_k;
    }
    if args.threads.is_some() {
        settings.search.threads = args.threads;
    }
    let search = &settings.search;

    let query_path = Path::new(&args.query_audio_path);
    if !query_path.exists() {
        anyhow::bail!("Query file not found: {}", query_path.display());
    }

    let engine = SearchEngine::new(&search.variant, &settings.analysis, search.threads)?;
    let variant = engine.variant().to_string();

    let corpus = list_corpus(Path::new(&search.corpus_directory), &search.extensions, &search.url_prefix)?;
    if corpus.is_empty() {
        log::warn!("No reference songs in {}", search.corpus_directory);
        return Ok(SearchOutput::empty_corpus(&args.query_audio_path, &variant, &search.corpus_directory));
    }

    log::info!("Matching {} against {} songs with {}", query_path.display(), corpus.len(), variant);
    let start = std::time::Instant::now();
    let query = engine
        .query_features(query_path)
        .with_context(|| format!("Failed to process query {}", query_path.display()))?;
    let report = engine.rank_corpus(&query, &corpus, search.top_k);
    log::info!("Search finished in {:.2}s", start.elapsed().as_secs_f64());

    Ok(SearchOutput::new(&args.query_audio_path, &variant, &report))
}
