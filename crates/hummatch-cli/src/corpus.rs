//! Reference corpus from a flat directory

use anyhow::{Context, Result};
use hummatch_core::CorpusEntry;
use std::path::{Path, PathBuf};

/// List reference files by extension (case-insensitive), sorted by file
/// name, each published under `url_prefix/<file name>`.
pub fn list_corpus(directory: &Path, extensions: &[String], url_prefix: &str) -> Result<Vec<CorpusEntry>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(directory)
        .with_context(|| format!("Failed to read corpus directory {}", directory.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let prefix = url_prefix.trim_end_matches('/');
    Ok(files
        .into_iter()
        .map(|path| {
            let entry = CorpusEntry::from_path(path);
            let url = format!("{}/{}", prefix, entry.name);
            entry.with_url(url)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b song.mp3", "a song.WAV", "notes.txt", "c.webm"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let extensions: Vec<String> = ["wav", "mp3", "ogg", "webm"].iter().map(|e| e.to_string()).collect();
        let corpus = list_corpus(dir.path(), &extensions, "/static/songs/").unwrap();

        let ids: Vec<&str> = corpus.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a song", "b song", "c"]);
        assert_eq!(corpus[1].url.as_deref(), Some("/static/songs/b song.mp3"));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_corpus(&dir.path().join("absent"), &["wav".to_string()], "/x").is_err());
    }
}
