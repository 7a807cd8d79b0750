// Map build entry point
//
// Usage: build_map [CONFIG]
// CONFIG defaults to $MAP_CONFIG, then pipeline.json; OUTPUT_PATH overrides the output file.

use anyhow::Context;
use species_map_builder::{Pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "species_map_builder=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path: PathBuf = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MAP_CONFIG").ok())
        .unwrap_or_else(|| "pipeline.json".to_string())
        .into();

    let mut config = PipelineConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    if let Ok(output) = std::env::var("OUTPUT_PATH") {
        config.output = PathBuf::from(output);
    }

    tracing::info!("Configuration:");
    tracing::info!("  Registry: {}", config.registry.display());
    tracing::info!("  Occurrences: {} ({:?})", config.occurrences.path.display(), config.occurrences.layout);
    tracing::info!("  Boundary dirs: {}", config.boundary_dirs.len());
    tracing::info!("  Output: {}", config.output.display());
    tracing::info!("  Closure: {:?}, subdivisions: {:?}", config.closure, config.subdivisions);

    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline.run().context("Map build failed")?;

    report.summary.log();
    if !report.assembly.omitted.is_empty() {
        let omitted: Vec<&str> = report.assembly.omitted.iter().map(|c| c.as_str()).collect();
        tracing::warn!("Omitted (no boundary): {}", omitted.join(", "));
    }
    if !report.defects.is_empty() {
        tracing::warn!("{} defects recorded", report.defects.len());
    }

    Ok(())
}
