//! CairnDB query layer: parsing, execution, and the engine value.
//!
//! A query line is tokenized and parsed into a [`ParsedQuery`], then
//! executed against an [`Engine`], which owns the catalog, the buffer
//! manager, and the configuration. There are no process-wide globals; the
//! whole engine is a constructible value, so the test suite drives it
//! without a shell.

pub mod engine;
pub mod executors;
pub mod parser;
pub mod query;

pub use engine::{Engine, Outcome};
pub use query::ParsedQuery;
