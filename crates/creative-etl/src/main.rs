mod bootstrap;

use anyhow::{Context, Result};
use etl_core::settings::Settings;
use etl_data::pipeline;

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Creative analytics ETL v{} starting", env!("CARGO_PKG_VERSION"));

    let config = settings.pipeline_config()?;
    tracing::info!(
        input = %config.input_dir.display(),
        csv = ?config.csv_dir,
        database = ?config.database,
        date_policy = ?config.date_policy,
        "Resolved configuration"
    );

    let output = pipeline::run(&config).with_context(|| {
        format!("ETL run over {} failed", config.input_dir.display())
    })?;

    tracing::info!(
        fact_rows = output.metadata.fact_rows,
        authors = output.metadata.authors,
        unmatched_campaigns = output.metadata.campaign_keys_failed,
        "Done"
    );

    Ok(())
}
