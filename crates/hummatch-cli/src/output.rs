//! JSON output formatting

use hummatch_core::SearchReport;
use serde::Serialize;

/// Metadata lookup happens outside this tool
const UNKNOWN_ARTIST: &str = "Unknown";

/// One ranked song
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SongMatch {
    pub song_name: String,
    pub artist: String,
    pub similarity_index: f64,
    pub file_url: String,
}

/// Successful search envelope
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub status: &'static str,
    pub query_path: String,
    pub variant: String,
    pub matched_songs_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub results: Vec<SongMatch>,
}

impl SearchOutput {
    /// `matched_songs_found` counts every scored reference, not just the top-K
    pub fn new(query_path: &str, variant: &str, report: &SearchReport) -> Self {
        let results: Vec<SongMatch> = report
            .results
            .iter()
            .map(|r| SongMatch {
                song_name: r.name.clone(),
                artist: UNKNOWN_ARTIST.to_string(),
                similarity_index: r.score,
                file_url: r.url.clone().unwrap_or_else(|| r.name.clone()),
            })
            .collect();
        Self {
            status: "success",
            query_path: query_path.to_string(),
            variant: variant.to_string(),
            matched_songs_found: report.scored,
            message: None,
            results,
        }
    }

    /// Nothing to search against is not a failure
    pub fn empty_corpus(query_path: &str, variant: &str, directory: &str) -> Self {
        Self {
            message: Some(format!("No reference songs found in {}", directory)),
            ..Self::new(
                query_path,
                variant,
                &SearchReport {
                    scored: 0,
                    results: Vec::new(),
                },
            )
        }
    }
}

/// Failure envelope
#[derive(Debug, Clone, Serialize)]
pub struct FailureOutput {
    pub status: &'static str,
    pub error: String,
}

impl FailureOutput {
    pub fn new(err: &anyhow::Error) -> Self {
        Self {
            status: "failed",
            error: format!("{:#}", err),
        }
    }
}

/// Print any serializable value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing result: {}", e),
    }
}

/// Print the failure envelope
pub fn print_failure(err: &anyhow::Error) {
    print_json(&FailureOutput::new(err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use hummatch_core::MatchResult;

    fn result(id: &str, score: f64) -> MatchResult {
        MatchResult {
            id: id.to_string(),
            name: format!("{}.mp3", id),
            url: Some(format!("/static/songs/{}.mp3", id)),
            score,
        }
    }

    #[test]
    fn test_search_envelope() {
        let report = SearchReport {
            scored: 8,
            results: vec![result("ode", 91.5), result("canon", 40.0)],
        };
        let output = SearchOutput::new("hum.webm", "robust-chroma", &report);
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["matched_songs_found"], 8);
        assert_eq!(json["results"].as_array().unwrap().len(), 2);
        assert_eq!(json["results"][0]["song_name"], "ode.mp3");
        assert_eq!(json["results"][0]["artist"], "Unknown");
        assert_eq!(json["results"][0]["similarity_index"], 91.5);
        assert_eq!(json["results"][0]["file_url"], "/static/songs/ode.mp3");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_empty_corpus_envelope() {
        let output = SearchOutput::empty_corpus("hum.wav", "fast-pitch", "./songs");
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["matched_songs_found"], 0);
        assert!(json["results"].as_array().unwrap().is_empty());
        assert!(json["message"].as_str().unwrap().contains("./songs"));
    }

    #[test]
    fn test_failure_envelope() {
        let err = anyhow::anyhow!("unknown variant 'x'").context("search failed");
        let json = serde_json::to_value(FailureOutput::new(&err)).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "search failed: unknown variant 'x'");
    }
}
