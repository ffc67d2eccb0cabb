//! CairnDB common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all CairnDB components.

pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{CairnError, Result};
pub use types::{AggregateFunction, BinaryOperator, RecordPointer, Row, SortOrder, CELL_SIZE};
