//! Corpus search tests over WAV files written to a temp directory

use super::*;
use crate::test_support::{arpeggio, melody, scale, trill, SR};
use std::path::Path;

fn write_wav(dir: &Path, name: &str, notes: &[(f32, f32)]) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for sample in melody(notes, SR) {
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn engine() -> SearchEngine {
    SearchEngine::new("default", &MatcherConfig::default(), Some(2)).unwrap()
}

#[test]
fn test_empty_corpus_returns_nothing() {
    let features = FeatureSequence::Chroma(vec![[1.0; 12]; 20]);
    assert!(engine().search_corpus(&features, &[], DEFAULT_TOP_K).is_empty());
}

#[test]
fn test_unknown_variant_fails_before_search() {
    let err = SearchEngine::new("karaoke", &MatcherConfig::default(), None).err().unwrap();
    assert!(matches!(err, MatchError::Configuration(_)));
}

#[test]
fn test_corpus_entry_from_path() {
    let entry = CorpusEntry::from_path("/songs/Ode To Joy.mp3").with_url("/static/songs/Ode To Joy.mp3");
    assert_eq!(entry.id, "Ode To Joy");
    assert_eq!(entry.name, "Ode To Joy.mp3");
    assert_eq!(entry.url.as_deref(), Some("/static/songs/Ode To Joy.mp3"));
}

#[test]
fn test_search_ranks_matching_song_first() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = vec![
        CorpusEntry::from_path(write_wav(dir.path(), "trill.wav", &trill())),
        CorpusEntry::from_path(write_wav(dir.path(), "arpeggio.wav", &arpeggio())),
        CorpusEntry::from_path(write_wav(dir.path(), "scale.wav", &scale())),
    ];
    let query = write_wav(dir.path(), "hum.wav", &arpeggio());

    let engine = engine();
    let results = engine.search(&query, &corpus, 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "arpeggio");
    assert!(results[0].score >= 95.0);
    assert!(results[0].score >= results[1].score);
}

#[test]
fn test_undecodable_reference_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.wav");
    std::fs::write(&broken, b"not a wav file").unwrap();
    let corpus = vec![
        CorpusEntry::from_path(&broken),
        CorpusEntry::from_path(write_wav(dir.path(), "arpeggio.wav", &arpeggio())),
    ];
    let query = write_wav(dir.path(), "hum.wav", &arpeggio());

    let results = engine().search(&query, &corpus, DEFAULT_TOP_K).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "arpeggio");
}

#[test]
fn test_missing_query_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = vec![CorpusEntry::from_path(write_wav(dir.path(), "a.wav", &arpeggio()))];
    let err = engine()
        .search(&dir.path().join("missing.wav"), &corpus, DEFAULT_TOP_K)
        .unwrap_err();
    assert!(matches!(err, MatchError::Decode { .. }));
}

#[test]
fn test_equal_scores_keep_corpus_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "copy.wav", &arpeggio());
    let corpus: Vec<CorpusEntry> = ["first", "second", "third"]
        .iter()
        .map(|id| CorpusEntry {
            id: id.to_string(),
            path: path.clone(),
            name: format!("{}.wav", id),
            url: None,
        })
        .collect();

    let engine = engine();
    let query = engine.query_features(&path).unwrap();
    for _ in 0..3 {
        let results = engine.search_corpus(&query, &corpus, DEFAULT_TOP_K);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }
}

#[test]
fn test_compare_query_returns_features() {
    let dir = tempfile::tempdir().unwrap();
    let query = write_wav(dir.path(), "hum.wav", &arpeggio());
    let (matcher, features) = compare_query(&query, "fast_pitch", &MatcherConfig::default()).unwrap();
    assert_eq!(matcher.variant(), Variant::FastPitch);
    assert!(matches!(features, FeatureSequence::Contour(_)));
    assert!(features.len() >= 10);
}

#[test]
fn test_report_counts_every_scored_reference() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.wav");
    std::fs::write(&broken, b"not a wav file").unwrap();
    let corpus = vec![
        CorpusEntry::from_path(write_wav(dir.path(), "trill.wav", &trill())),
        CorpusEntry::from_path(&broken),
        CorpusEntry::from_path(write_wav(dir.path(), "arpeggio.wav", &arpeggio())),
        CorpusEntry::from_path(write_wav(dir.path(), "scale.wav", &scale())),
    ];

    let engine = engine();
    let query = engine.query_features(&write_wav(dir.path(), "hum.wav", &arpeggio())).unwrap();
    let report = engine.rank_corpus(&query, &corpus, 1);
    assert_eq!(report.scored, 3);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].id, "arpeggio");

    let empty = engine.rank_corpus(&query, &[], 1);
    assert_eq!(empty.scored, 0);
}
