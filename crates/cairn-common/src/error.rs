//! Error types for CairnDB.

use crate::types::RecordPointer;
use thiserror::Error;

/// Result type alias using CairnError.
pub type Result<T> = std::result::Result<T, CairnError>;

/// Errors that can occur in CairnDB operations.
#[derive(Debug, Error)]
pub enum CairnError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Query-layer errors
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("semantic error: {0}")]
    Semantic(String),

    // Catalog errors
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("name already in use: {0}")]
    NameInUse(String),

    // Storage errors
    #[error("page not found: {owner} page {page_index}")]
    PageNotFound { owner: String, page_index: usize },

    #[error("page corrupt: {owner} page {page_index}: {reason}")]
    PageCorrupt {
        owner: String,
        page_index: usize,
        reason: String,
    },

    // Index errors
    #[error("stale index pointer {pointer} on table {table}")]
    IndexStale {
        table: String,
        pointer: RecordPointer,
    },

    // Internal errors
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: CairnError = io_err.into();
        assert!(matches!(err, CairnError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_query_errors_display() {
        let err = CairnError::Syntax("unexpected token 'FROMM'".to_string());
        assert_eq!(err.to_string(), "syntax error: unexpected token 'FROMM'");

        let err = CairnError::Semantic("duplicate column 'a'".to_string());
        assert_eq!(err.to_string(), "semantic error: duplicate column 'a'");
    }

    #[test]
    fn test_catalog_errors_display() {
        let err = CairnError::TableNotFound("users".to_string());
        assert_eq!(err.to_string(), "table not found: users");

        let err = CairnError::ColumnNotFound("email".to_string());
        assert_eq!(err.to_string(), "column not found: email");

        let err = CairnError::NameInUse("orders".to_string());
        assert_eq!(err.to_string(), "name already in use: orders");
    }

    #[test]
    fn test_storage_errors_display() {
        let err = CairnError::PageNotFound {
            owner: "users".to_string(),
            page_index: 3,
        };
        assert_eq!(err.to_string(), "page not found: users page 3");

        let err = CairnError::PageCorrupt {
            owner: "users".to_string(),
            page_index: 0,
            reason: "expected 8 values, got 5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "page corrupt: users page 0: expected 8 values, got 5"
        );
    }

    #[test]
    fn test_index_stale_display() {
        let err = CairnError::IndexStale {
            table: "users".to_string(),
            pointer: RecordPointer::new(4, 17),
        };
        assert_eq!(err.to_string(), "stale index pointer 4:17 on table users");
    }

    #[test]
    fn test_internal_errors_display() {
        let err = CairnError::InternalInvariant("row_count mismatch".to_string());
        assert_eq!(
            err.to_string(),
            "internal invariant violated: row_count mismatch"
        );

        let err = CairnError::Config("block_size is zero".to_string());
        assert_eq!(err.to_string(), "configuration error: block_size is zero");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(CairnError::InternalInvariant("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CairnError>();
    }
}
