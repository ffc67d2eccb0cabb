//! Core value types shared across CairnDB components.

use serde::{Deserialize, Serialize};

/// Size in bytes of one stored cell (one machine integer).
pub const CELL_SIZE: usize = std::mem::size_of::<i64>();

/// One table row: a fixed-width sequence of integers.
pub type Row = Vec<i64>;

/// Physical address of a row within a table.
///
/// A record pointer is a plain value with no ownership; it may become stale
/// if the addressed page is rewritten with a different layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordPointer {
    /// Page (block) index within the owning table.
    pub page: usize,
    /// Row index within that page.
    pub row: usize,
}

impl RecordPointer {
    /// Creates a new record pointer.
    pub fn new(page: usize, row: usize) -> Self {
        Self { page, row }
    }
}

impl std::fmt::Display for RecordPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page, self.row)
    }
}

/// Comparison operators accepted in query conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOperator {
    /// Parses an operator token. Accepts `=<` and `=>` as written variants
    /// of `<=` and `>=`.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            "<" => Some(Self::LessThan),
            "<=" | "=<" => Some(Self::LessEqual),
            ">" => Some(Self::GreaterThan),
            ">=" | "=>" => Some(Self::GreaterEqual),
            _ => None,
        }
    }

    /// Evaluates `left op right`.
    pub fn evaluate(self, left: i64, right: i64) -> bool {
        match self {
            Self::Equal => left == right,
            Self::NotEqual => left != right,
            Self::LessThan => left < right,
            Self::LessEqual => left <= right,
            Self::GreaterThan => left > right,
            Self::GreaterEqual => left >= right,
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
        };
        f.write_str(s)
    }
}

/// Sort direction for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Parses an `ASC` / `DESC` token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ASC" => Some(Self::Ascending),
            "DESC" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// Aggregate functions available in GROUP BY clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Max,
    Min,
    Sum,
    Count,
    Avg,
}

impl AggregateFunction {
    /// Parses an aggregate function name.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "MAX" => Some(Self::Max),
            "MIN" => Some(Self::Min),
            "SUM" => Some(Self::Sum),
            "COUNT" => Some(Self::Count),
            "AVG" => Some(Self::Avg),
            _ => None,
        }
    }

    /// The upper-case name used when labelling result columns.
    pub fn name(self) -> &'static str {
        match self {
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Sum => "SUM",
            Self::Count => "COUNT",
            Self::Avg => "AVG",
        }
    }

    /// Applies the aggregate to a group of values.
    ///
    /// An empty group yields zero. AVG is truncated integer division of the
    /// sum by the count.
    pub fn apply(self, values: &[i64]) -> i64 {
        if values.is_empty() {
            return 0;
        }
        match self {
            Self::Max => values.iter().copied().max().unwrap_or(0),
            Self::Min => values.iter().copied().min().unwrap_or(0),
            Self::Sum => values.iter().sum(),
            Self::Count => values.len() as i64,
            Self::Avg => values.iter().sum::<i64>() / values.len() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_pointer_new() {
        let ptr = RecordPointer::new(3, 17);
        assert_eq!(ptr.page, 3);
        assert_eq!(ptr.row, 17);
    }

    #[test]
    fn test_record_pointer_display() {
        assert_eq!(RecordPointer::new(5, 123).to_string(), "5:123");
        assert_eq!(RecordPointer::new(0, 0).to_string(), "0:0");
    }

    #[test]
    fn test_record_pointer_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(RecordPointer::new(1, 1));
        set.insert(RecordPointer::new(1, 2));
        set.insert(RecordPointer::new(1, 1)); // Duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_record_pointer_serde_roundtrip() {
        let original = RecordPointer::new(10, 500);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: RecordPointer = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_binary_operator_parse() {
        assert_eq!(BinaryOperator::parse("=="), Some(BinaryOperator::Equal));
        assert_eq!(BinaryOperator::parse("!="), Some(BinaryOperator::NotEqual));
        assert_eq!(BinaryOperator::parse("<"), Some(BinaryOperator::LessThan));
        assert_eq!(BinaryOperator::parse("<="), Some(BinaryOperator::LessEqual));
        assert_eq!(BinaryOperator::parse("=<"), Some(BinaryOperator::LessEqual));
        assert_eq!(BinaryOperator::parse(">"), Some(BinaryOperator::GreaterThan));
        assert_eq!(
            BinaryOperator::parse(">="),
            Some(BinaryOperator::GreaterEqual)
        );
        assert_eq!(
            BinaryOperator::parse("=>"),
            Some(BinaryOperator::GreaterEqual)
        );
        assert_eq!(BinaryOperator::parse("="), None);
        assert_eq!(BinaryOperator::parse("<>"), None);
    }

    #[test]
    fn test_binary_operator_evaluate() {
        assert!(BinaryOperator::Equal.evaluate(5, 5));
        assert!(!BinaryOperator::Equal.evaluate(5, 6));
        assert!(BinaryOperator::NotEqual.evaluate(5, 6));
        assert!(BinaryOperator::LessThan.evaluate(-1, 0));
        assert!(!BinaryOperator::LessThan.evaluate(0, 0));
        assert!(BinaryOperator::LessEqual.evaluate(0, 0));
        assert!(BinaryOperator::GreaterThan.evaluate(7, 3));
        assert!(BinaryOperator::GreaterEqual.evaluate(3, 3));
    }

    #[test]
    fn test_binary_operator_display() {
        assert_eq!(BinaryOperator::Equal.to_string(), "==");
        assert_eq!(BinaryOperator::LessEqual.to_string(), "<=");
        assert_eq!(BinaryOperator::GreaterEqual.to_string(), ">=");
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("ASC"), Some(SortOrder::Ascending));
        assert_eq!(SortOrder::parse("DESC"), Some(SortOrder::Descending));
        assert_eq!(SortOrder::parse("asc"), None);
        assert_eq!(SortOrder::parse("UP"), None);
    }

    #[test]
    fn test_aggregate_parse_and_name() {
        for (token, func) in [
            ("MAX", AggregateFunction::Max),
            ("MIN", AggregateFunction::Min),
            ("SUM", AggregateFunction::Sum),
            ("COUNT", AggregateFunction::Count),
            ("AVG", AggregateFunction::Avg),
        ] {
            assert_eq!(AggregateFunction::parse(token), Some(func));
            assert_eq!(func.name(), token);
        }
        assert_eq!(AggregateFunction::parse("MEDIAN"), None);
    }

    #[test]
    fn test_aggregate_apply() {
        let values = [3, 1, 4, 1, 5];
        assert_eq!(AggregateFunction::Max.apply(&values), 5);
        assert_eq!(AggregateFunction::Min.apply(&values), 1);
        assert_eq!(AggregateFunction::Sum.apply(&values), 14);
        assert_eq!(AggregateFunction::Count.apply(&values), 5);
        // 14 / 5 truncates to 2
        assert_eq!(AggregateFunction::Avg.apply(&values), 2);
    }

    #[test]
    fn test_aggregate_apply_negative_avg() {
        // Rust integer division truncates toward zero
        assert_eq!(AggregateFunction::Avg.apply(&[-3, -4]), -3);
    }

    #[test]
    fn test_aggregate_apply_empty() {
        for func in [
            AggregateFunction::Max,
            AggregateFunction::Min,
            AggregateFunction::Sum,
            AggregateFunction::Count,
            AggregateFunction::Avg,
        ] {
            assert_eq!(func.apply(&[]), 0);
        }
    }
}
