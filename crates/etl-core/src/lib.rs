//! Core types for the creative analytics ETL.
//!
//! Holds the typed table model, the error taxonomy, run configuration and
//! the per-row metric derivations shared by the data layer and the binary.

pub mod dates;
pub mod error;
pub mod metrics;
pub mod models;
pub mod settings;

pub use error::{EtlError, Result};
