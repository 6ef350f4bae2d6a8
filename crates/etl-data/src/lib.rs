//! Data layer for the creative analytics ETL.
//!
//! Responsible for loading the workbook exports, normalizing each source,
//! extracting campaign keys, joining the fact table, aggregating per author,
//! and persisting both outputs.

pub mod aggregator;
pub mod campaign;
pub mod joiner;
pub mod normalizer;
pub mod pipeline;
pub mod reader;
pub mod writer;

pub use etl_core as core;
