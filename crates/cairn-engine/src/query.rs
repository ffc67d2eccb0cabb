//! Parsed query values.
//!
//! The parser produces one [`ParsedQuery`] per input line; executors
//! consume it by value. Nothing here touches the catalog: name and column
//! resolution happens in the executors, which report semantic errors.

use cairn_common::{AggregateFunction, BinaryOperator, SortOrder};

/// A `WHERE <column> <op> <literal>` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub op: BinaryOperator,
    pub value: i64,
}

/// An `AGG(column)` reference in a GROUP BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSpec {
    pub func: AggregateFunction,
    pub column: String,
}

/// Right-hand side of a SELECT condition: another column or a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectRhs {
    Column(String),
    Literal(i64),
}

/// Index strategies accepted by INDEX ... USING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    BTree,
    Nothing,
}

/// One fully parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedQuery {
    Load {
        table: String,
    },
    Export {
        table: String,
    },
    Clear {
        table: String,
    },
    ListTables,
    Print {
        table: String,
    },
    Rename {
        table: String,
        from: String,
        to: String,
    },
    Project {
        result: String,
        table: String,
        columns: Vec<String>,
    },
    Select {
        result: String,
        table: String,
        column: String,
        op: BinaryOperator,
        rhs: SelectRhs,
    },
    Cross {
        result: String,
        left: String,
        right: String,
    },
    Distinct {
        result: String,
        table: String,
    },
    Join {
        result: String,
        left: String,
        right: String,
        left_column: String,
        op: BinaryOperator,
        right_column: String,
    },
    Search {
        result: String,
        table: String,
        condition: Condition,
    },
    OrderBy {
        result: String,
        table: String,
        column: String,
        order: SortOrder,
    },
    GroupBy {
        result: String,
        table: String,
        group_column: String,
        having: AggregateSpec,
        having_op: BinaryOperator,
        having_value: i64,
        returning: AggregateSpec,
    },
    Sort {
        table: String,
        keys: Vec<(String, SortOrder)>,
    },
    Index {
        table: String,
        column: String,
        strategy: IndexStrategy,
    },
    Insert {
        table: String,
        assignments: Vec<(String, i64)>,
    },
    Update {
        table: String,
        condition: Condition,
        target_column: String,
        value: i64,
    },
    Delete {
        table: String,
        condition: Condition,
    },
    Source {
        script: String,
    },
    Quit,
}
