use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{EtlError, Result};
use crate::models::DatePolicy;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Build the creative performance fact table and author summary
#[derive(Parser, Debug, Clone)]
#[command(
    name = "creative-etl",
    about = "Build the creative performance fact table and author summary",
    version
)]
pub struct Settings {
    /// Directory holding one CSV export per workbook sheet
    #[arg(long, env = "CREATIVE_ETL_INPUT_DIR", default_value = "data")]
    pub input_dir: PathBuf,

    /// Directory the CSV outputs are written to
    #[arg(long, env = "CREATIVE_ETL_OUTPUT_DIR", default_value = "outputs")]
    pub output_dir: PathBuf,

    /// SQLite database file receiving both output tables
    #[arg(long, env = "CREATIVE_ETL_DATABASE")]
    pub database: Option<PathBuf>,

    /// Skip writing CSV files
    #[arg(long)]
    pub no_csv: bool,

    /// How unparsable dates are handled
    #[arg(long, value_enum, default_value_t = DatePolicy::Strict)]
    pub date_policy: DatePolicy,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── PipelineConfig ─────────────────────────────────────────────────────────────

/// Everything a pipeline run needs to know about its inputs and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the sheet exports.
    pub input_dir: PathBuf,
    /// CSV destination; `None` disables the CSV sink.
    pub csv_dir: Option<PathBuf>,
    /// SQLite destination; `None` disables the relational sink.
    pub database: Option<PathBuf>,
    pub date_policy: DatePolicy,
}

impl PipelineConfig {
    /// Config for an in-memory run with no sinks.
    pub fn in_memory(date_policy: DatePolicy) -> Self {
        Self {
            input_dir: PathBuf::new(),
            csv_dir: None,
            database: None,
            date_policy,
        }
    }

    pub fn has_sink(&self) -> bool {
        self.csv_dir.is_some() || self.database.is_some()
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] but from an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::try_parse_from(args).map(Self::resolve)
    }

    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Build the pipeline configuration; at least one sink must be enabled.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            input_dir: self.input_dir.clone(),
            csv_dir: (!self.no_csv).then(|| self.output_dir.clone()),
            database: self.database.clone(),
            date_policy: self.date_policy,
        };
        if !config.has_sink() {
            return Err(EtlError::Config(
                "--no-csv requires --database, otherwise nothing is persisted".to_string(),
            ));
        }
        Ok(config)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
