use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;

use city_asset_mapper::{
    init_tracing, AppConfig, MapProfile, MapperPipeline, ProgressObserver, ResolveProgress,
    RunOutcome,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let input = match args.next() {
        Some(path) => PathBuf::from(path),
        None => bail!("usage: city-asset-mapper <input-file> [standard|india]"),
    };
    let profile = match args.next() {
        Some(name) => MapProfile::parse(&name)?,
        None => MapProfile::standard(),
    };

    let config = AppConfig::from_env();
    let pipeline = MapperPipeline::new(&config, profile)?;

    let observer: ProgressObserver = Arc::new(|progress: ResolveProgress| {
        if progress.processed % 10 == 0 || progress.processed == progress.total_rows {
            info!(
                processed = progress.processed,
                total = progress.total_rows,
                resolved = progress.resolved,
                "geocoding"
            );
        }
    });

    let run = pipeline
        .run_file(&input, Some(observer))
        .await
        .with_context(|| format!("failed to process {}", input.display()))?;

    if let RunOutcome::Mapped(view) = run.outcome {
        println!("{}", serde_json::to_string_pretty(&view)?);
    }
    Ok(())
}
