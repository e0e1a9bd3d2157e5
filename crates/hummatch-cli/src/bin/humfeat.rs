//! humfeat - Melodic feature extractor
//!
//! Usage: humfeat <input_audio_path> [--variant <id>]

use anyhow::Result;
use clap::Parser;
use hummatch_cli::output::print_json;
use hummatch_core::{matcher_for, settings::SETTINGS_FILE, FeatureSequence, HummatchSettings};
use serde::Serialize;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "humfeat")]
#[command(about = "Print the melodic features hummatch extracts from an audio file", long_about = None)]
struct Args {
    /// Input audio file path
    input_audio_path: String,

    /// Matching variant (defaults to the configured one)
    #[arg(long)]
    variant: Option<String>,

    /// Settings file
    #[arg(short, long, default_value = SETTINGS_FILE)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct FeatureOutput {
    input_path: String,
    variant: String,
    duration_seconds: f64,
    frame_count: usize,
    features: FeatureSequence,
}

fn main() -> Result<()> {
    let args = Args::parse();
    hummatch_cli::init_logging(args.verbose);

    let settings = HummatchSettings::load_or_default(Path::new(&args.config))?;
    let variant_id = args.variant.as_deref().unwrap_or(&settings.search.variant);
    let matcher = matcher_for(variant_id, &settings.analysis)?;

    let input_path = Path::new(&args.input_audio_path);
    if !input_path.exists() {
        anyhow::bail!("Input file not found: {}", input_path.display());
    }

    let start = std::time::Instant::now();
    let buffer = matcher.load(input_path)?;
    let features = matcher.extract_features(&buffer);
    log::info!(
        "Extracted {} frames with {} in {:.2}s",
        features.len(),
        matcher.variant(),
        start.elapsed().as_secs_f64()
    );

    print_json(&FeatureOutput {
        input_path: args.input_audio_path.clone(),
        variant: matcher.variant().to_string(),
        duration_seconds: buffer.duration_s(),
        frame_count: features.len(),
        features,
    });
    Ok(())
}
