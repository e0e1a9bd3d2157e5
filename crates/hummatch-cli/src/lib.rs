//! Shared helpers for the hummatch binaries

pub mod corpus;
pub mod output;

/// Initialise logging; silent unless verbose so stdout stays clean JSON
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
