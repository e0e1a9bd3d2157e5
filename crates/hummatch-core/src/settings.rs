//! Search settings for hummatch
//!
//! TOML file (`hummatch.toml`) selecting the variant, the reference
//! corpus and how results are published, plus the analysis parameters.

use crate::config::MatcherConfig;
use crate::search::DEFAULT_TOP_K;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default settings file name
pub const SETTINGS_FILE: &str = "hummatch.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HummatchSettings {
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub analysis: MatcherConfig,
}

/// Corpus search settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchSettings {
    #[serde(default = "default_variant")]
    pub variant: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_corpus_directory")]
    pub corpus_directory: String,
    /// Extensions (without dot) of files that count as references
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Worker threads; unset means one per core
    #[serde(default)]
    pub threads: Option<usize>,
    /// Prefix for published file URLs
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            top_k: default_top_k(),
            corpus_directory: default_corpus_directory(),
            extensions: default_extensions(),
            threads: None,
            url_prefix: default_url_prefix(),
        }
    }
}

fn default_variant() -> String {
    "default".to_string()
}
fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_corpus_directory() -> String {
    "./songs".to_string()
}
fn default_extensions() -> Vec<String> {
    ["wav", "mp3", "ogg", "webm"].iter().map(|e| e.to_string()).collect()
}
fn default_url_prefix() -> String {
    "/static/songs".to_string()
}

impl HummatchSettings {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let settings: HummatchSettings =
            toml::from_str(&content).map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        settings.analysis.validate()?;
        Ok(settings)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings: HummatchSettings = toml::from_str("").unwrap();
        assert_eq!(settings.search.variant, "default");
        assert_eq!(settings.search.top_k, 5);
        assert_eq!(settings.search.extensions, vec!["wav", "mp3", "ogg", "webm"]);
        assert_eq!(settings.search.url_prefix, "/static/songs");
        assert!(settings.search.threads.is_none());
        assert_eq!(settings.analysis.sample_rate, 22050);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [search]
            variant = "refined-pitch"
            top_k = 3
            corpus_directory = "/srv/songs"
            extensions = ["wav", "flac"]
            threads = 4
            url_prefix = "https://example.org/audio"

            [analysis]
            hop_length = 256

            [analysis.pitch]
            refined_gate = 0.2

            [analysis.scoring]
            zscore_threshold = 2.5
        "#;

        let settings: HummatchSettings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.search.variant, "refined-pitch");
        assert_eq!(settings.search.top_k, 3);
        assert_eq!(settings.search.corpus_directory, "/srv/songs");
        assert_eq!(settings.search.extensions, vec!["wav", "flac"]);
        assert_eq!(settings.search.threads, Some(4));
        assert_eq!(settings.analysis.hop_length, 256);
        assert!((settings.analysis.pitch.refined_gate - 0.2).abs() < 1e-6);
        assert!((settings.analysis.scoring.zscore_threshold - 2.5).abs() < 1e-12);
        assert_eq!(settings.analysis.pitch.refined_median_window, 5);
    }

    #[test]
    fn test_load_rejects_invalid_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "[analysis.pitch]\nrefined_median_window = 4\n").unwrap();
        assert!(HummatchSettings::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let settings = HummatchSettings::load_or_default(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings.search.top_k, DEFAULT_TOP_K);
        assert!(HummatchSettings::load(&dir.path().join(SETTINGS_FILE)).is_err());
    }
}
