//! Hummatch Core - Query-by-humming melody matching
//!
//! Decodes a hummed or sung query, turns it into a melodic feature
//! sequence (chroma or pitch contour), aligns it against reference
//! recordings with subsequence DTW and scores the similarity 0-100.

pub mod alignment;
pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod matcher;
pub mod preprocess;
pub mod scoring;
pub mod search;
pub mod settings;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_support;

pub use audio::SampleBuffer;
pub use config::MatcherConfig;
pub use error::MatchError;
pub use features::FeatureSequence;
pub use matcher::{build_matcher, matcher_for, MelodyMatcher, Variant};
pub use search::{compare_query, CorpusEntry, MatchResult, SearchEngine, SearchReport, DEFAULT_TOP_K};
pub use settings::HummatchSettings;
