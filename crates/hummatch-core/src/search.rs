//! Corpus search: one query against many references
//!
//! Query features are extracted once. References are decoded and analysed
//! on a bounded rayon pool; results keep corpus order until the final
//! stable sort, so equal scores rank the same way on every run.

use crate::config::MatcherConfig;
use crate::error::MatchError;
use crate::features::FeatureSequence;
use crate::matcher::{matcher_for, MelodyMatcher, Variant};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(test)]
mod tests;

/// Number of results returned when the caller does not say
pub const DEFAULT_TOP_K: usize = 5;

/// One reference recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    /// Identifier, usually the file stem
    pub id: String,
    pub path: PathBuf,
    /// Display name, usually the file name
    pub name: String,
    pub url: Option<String>,
}

impl CorpusEntry {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        Self {
            id,
            path,
            name,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Scored reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Similarity in [0, 100], two decimals
    pub score: f64,
}

/// Ranked results plus how many references were scored before truncation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub scored: usize,
    pub results: Vec<MatchResult>,
}

/// Decode and analyse a query with the matcher for `variant_id`
pub fn compare_query(
    query_path: &Path,
    variant_id: &str,
    config: &MatcherConfig,
) -> Result<(Box<dyn MelodyMatcher>, FeatureSequence), MatchError> {
    let matcher = matcher_for(variant_id, config)?;
    let buffer = matcher.load(query_path)?;
    let features = matcher.extract_features(&buffer);
    debug!(
        "Query {}: {} frames ({})",
        query_path.display(),
        features.len(),
        matcher.variant()
    );
    Ok((matcher, features))
}

/// Matcher plus worker pool, built once per request
pub struct SearchEngine {
    matcher: Box<dyn MelodyMatcher>,
    pool: rayon::ThreadPool,
}

impl SearchEngine {
    /// `threads = None` sizes the pool to the available cores
    pub fn new(variant_id: &str, config: &MatcherConfig, threads: Option<usize>) -> Result<Self, MatchError> {
        let matcher = matcher_for(variant_id, config)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .build()
            .map_err(|e| MatchError::Configuration(format!("failed to build worker pool: {}", e)))?;
        Ok(Self { matcher, pool })
    }

    pub fn variant(&self) -> Variant {
        self.matcher.variant()
    }

    /// Decode and analyse the query; failures abort the request
    pub fn query_features(&self, query_path: &Path) -> Result<FeatureSequence, MatchError> {
        let buffer = self.matcher.load(query_path)?;
        Ok(self.matcher.extract_features(&buffer))
    }

    /// Score every reference and return the best `top_k`, highest first.
    ///
    /// References that fail to decode are logged and left out.
    pub fn search_corpus(&self, query: &FeatureSequence, corpus: &[CorpusEntry], top_k: usize) -> Vec<MatchResult> {
        self.rank_corpus(query, corpus, top_k).results
    }

    /// Like [`search_corpus`](Self::search_corpus), keeping the number of
    /// references that were actually scored
    pub fn rank_corpus(&self, query: &FeatureSequence, corpus: &[CorpusEntry], top_k: usize) -> SearchReport {
        if corpus.is_empty() {
            info!("Corpus is empty, nothing to compare");
            return SearchReport {
                scored: 0,
                results: Vec::new(),
            };
        }

        info!(
            "Comparing query ({} frames) against {} references with {} on {} threads",
            query.len(),
            corpus.len(),
            self.variant(),
            self.pool.current_num_threads()
        );
        let start = Instant::now();

        let scored: Vec<Option<MatchResult>> = self.pool.install(|| {
            corpus
                .par_iter()
                .map(|entry| self.score_entry(query, entry))
                .collect()
        });

        let mut results: Vec<MatchResult> = scored.into_iter().flatten().collect();
        let scored = results.len();
        info!(
            "Scored {} of {} references in {:.2}s",
            scored,
            corpus.len(),
            start.elapsed().as_secs_f64()
        );

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        SearchReport { scored, results }
    }

    /// Query file to ranked results
    pub fn search(&self, query_path: &Path, corpus: &[CorpusEntry], top_k: usize) -> Result<Vec<MatchResult>, MatchError> {
        let query = self.query_features(query_path)?;
        Ok(self.search_corpus(&query, corpus, top_k))
    }

    fn score_entry(&self, query: &FeatureSequence, entry: &CorpusEntry) -> Option<MatchResult> {
        let buffer = match self.matcher.load(&entry.path) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path.display(), e);
                return None;
            }
        };
        let reference = self.matcher.extract_features(&buffer);
        let score = self.matcher.compare_features(query, &reference);
        debug!("{} -> {:.2}", entry.id, score);

        Some(MatchResult {
            id: entry.id.clone(),
            name: entry.name.clone(),
            url: entry.url.clone(),
            score,
        })
    }
}
