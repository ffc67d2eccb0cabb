//! Tokenizer and syntactic parser.
//!
//! Lines are split on whitespace and commas. The syntactic layer checks
//! token shape only; existence of tables and columns is checked by the
//! executors against the catalog.

use crate::query::{AggregateSpec, Condition, IndexStrategy, ParsedQuery, SelectRhs};
use cairn_common::{AggregateFunction, BinaryOperator, CairnError, Result, SortOrder};

/// Splits a query line into tokens. Commas separate like whitespace, so
/// `a,b` and `a, b` tokenize identically.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in line.split_whitespace() {
        for piece in word.split(',') {
            if !piece.is_empty() {
                tokens.push(piece.to_string());
            }
        }
    }
    tokens
}

fn syntax(msg: impl Into<String>) -> CairnError {
    CairnError::Syntax(msg.into())
}

fn parse_int(token: &str, what: &str) -> Result<i64> {
    token
        .parse::<i64>()
        .map_err(|_| syntax(format!("{what} requires an integer literal, got '{token}'")))
}

fn parse_operator(token: &str) -> Result<BinaryOperator> {
    BinaryOperator::parse(token).ok_or_else(|| syntax(format!("invalid operator '{token}'")))
}

fn parse_aggregate(token: &str) -> Result<AggregateSpec> {
    let open = token
        .find('(')
        .ok_or_else(|| syntax(format!("expected AGG(column), got '{token}'")))?;
    if !token.ends_with(')') || open + 1 >= token.len() - 1 {
        return Err(syntax(format!("expected AGG(column), got '{token}'")));
    }
    let func = AggregateFunction::parse(&token[..open])
        .ok_or_else(|| syntax(format!("unknown aggregate '{}'", &token[..open])))?;
    let column = token[open + 1..token.len() - 1].to_string();
    Ok(AggregateSpec { func, column })
}

/// Parses a tokenized query line into a [`ParsedQuery`].
pub fn parse(tokens: &[String]) -> Result<ParsedQuery> {
    if tokens.is_empty() {
        return Err(syntax("empty query"));
    }
    if tokens.len() >= 2 && tokens[1] == "<-" {
        return parse_assignment(tokens);
    }

    match tokens[0].as_str() {
        "LOAD" if tokens.len() == 2 => Ok(ParsedQuery::Load {
            table: tokens[1].clone(),
        }),
        "EXPORT" if tokens.len() == 2 => Ok(ParsedQuery::Export {
            table: tokens[1].clone(),
        }),
        "CLEAR" if tokens.len() == 2 => Ok(ParsedQuery::Clear {
            table: tokens[1].clone(),
        }),
        "LIST" if tokens.len() == 2 && tokens[1] == "TABLES" => Ok(ParsedQuery::ListTables),
        "PRINT" if tokens.len() == 2 => Ok(ParsedQuery::Print {
            table: tokens[1].clone(),
        }),
        "RENAME" if tokens.len() == 6 && tokens[2] == "TO" && tokens[4] == "FROM" => {
            Ok(ParsedQuery::Rename {
                table: tokens[5].clone(),
                from: tokens[1].clone(),
                to: tokens[3].clone(),
            })
        }
        "SOURCE" if tokens.len() == 2 => Ok(ParsedQuery::Source {
            script: tokens[1].clone(),
        }),
        "QUIT" if tokens.len() == 1 => Ok(ParsedQuery::Quit),
        "SORT" => parse_sort(tokens),
        "INDEX" => parse_index(tokens),
        "INSERT" => parse_insert(tokens),
        "UPDATE" => parse_update(tokens),
        "DELETE" => parse_delete(tokens),
        other => Err(syntax(format!("unrecognized query '{other}'"))),
    }
}

fn parse_assignment(tokens: &[String]) -> Result<ParsedQuery> {
    let result = tokens[0].clone();
    let verb = tokens
        .get(2)
        .ok_or_else(|| syntax("missing operator after '<-'"))?;
    match verb.as_str() {
        "PROJECT" => {
            // R <- PROJECT c1,c2,... FROM T
            let from = tokens
                .iter()
                .position(|t| t == "FROM")
                .ok_or_else(|| syntax("PROJECT requires FROM"))?;
            if from <= 3 || from + 2 != tokens.len() {
                return Err(syntax(
                    "expected: <R> <- PROJECT <columns> FROM <table>",
                ));
            }
            Ok(ParsedQuery::Project {
                result,
                table: tokens[from + 1].clone(),
                columns: tokens[3..from].to_vec(),
            })
        }
        "SELECT" => {
            // R <- SELECT col op <col|int> FROM T
            if tokens.len() != 8 || tokens[6] != "FROM" {
                return Err(syntax(
                    "expected: <R> <- SELECT <col> <op> <col|int> FROM <table>",
                ));
            }
            let op = parse_operator(&tokens[4])?;
            let rhs = match tokens[5].parse::<i64>() {
                Ok(value) => SelectRhs::Literal(value),
                Err(_) => SelectRhs::Column(tokens[5].clone()),
            };
            Ok(ParsedQuery::Select {
                result,
                table: tokens[7].clone(),
                column: tokens[3].clone(),
                op,
                rhs,
            })
        }
        "JOIN" => {
            // R <- JOIN T1, T2 ON c1 op c2
            if tokens.len() != 9 || tokens[5] != "ON" {
                return Err(syntax(
                    "expected: <R> <- JOIN <T1>, <T2> ON <col1> <op> <col2>",
                ));
            }
            Ok(ParsedQuery::Join {
                result,
                left: tokens[3].clone(),
                right: tokens[4].clone(),
                left_column: tokens[6].clone(),
                op: parse_operator(&tokens[7])?,
                right_column: tokens[8].clone(),
            })
        }
        "CROSS" => {
            if tokens.len() != 5 {
                return Err(syntax("expected: <R> <- CROSS <T1>, <T2>"));
            }
            Ok(ParsedQuery::Cross {
                result,
                left: tokens[3].clone(),
                right: tokens[4].clone(),
            })
        }
        "DISTINCT" => {
            if tokens.len() != 4 {
                return Err(syntax("expected: <R> <- DISTINCT <table>"));
            }
            Ok(ParsedQuery::Distinct {
                result,
                table: tokens[3].clone(),
            })
        }
        "SEARCH" => {
            // R <- SEARCH FROM T WHERE col op int
            if tokens.len() != 9 || tokens[3] != "FROM" || tokens[5] != "WHERE" {
                return Err(syntax(
                    "expected: <R> <- SEARCH FROM <table> WHERE <col> <op> <int>",
                ));
            }
            Ok(ParsedQuery::Search {
                result,
                table: tokens[4].clone(),
                condition: Condition {
                    column: tokens[6].clone(),
                    op: parse_operator(&tokens[7])?,
                    value: parse_int(&tokens[8], "SEARCH condition")?,
                },
            })
        }
        "ORDER" => {
            // R <- ORDER BY col ASC|DESC ON T
            if tokens.len() != 8 || tokens[3] != "BY" || tokens[6] != "ON" {
                return Err(syntax(
                    "expected: <R> <- ORDER BY <col> ASC|DESC ON <table>",
                ));
            }
            let order = SortOrder::parse(&tokens[5])
                .ok_or_else(|| syntax(format!("expected ASC or DESC, got '{}'", tokens[5])))?;
            Ok(ParsedQuery::OrderBy {
                result,
                table: tokens[7].clone(),
                column: tokens[4].clone(),
                order,
            })
        }
        "GROUP" => {
            // R <- GROUP BY attr FROM T HAVING AGG(c) op v RETURN AGG(c)
            if tokens.len() != 13
                || tokens[3] != "BY"
                || tokens[5] != "FROM"
                || tokens[7] != "HAVING"
                || tokens[11] != "RETURN"
            {
                return Err(syntax(
                    "expected: <R> <- GROUP BY <col> FROM <table> HAVING <AGG(col)> <op> <int> RETURN <AGG(col)>",
                ));
            }
            Ok(ParsedQuery::GroupBy {
                result,
                table: tokens[6].clone(),
                group_column: tokens[4].clone(),
                having: parse_aggregate(&tokens[8])?,
                having_op: parse_operator(&tokens[9])?,
                having_value: parse_int(&tokens[10], "HAVING")?,
                returning: parse_aggregate(&tokens[12])?,
            })
        }
        other => Err(syntax(format!("unrecognized assignment operator '{other}'"))),
    }
}

fn parse_sort(tokens: &[String]) -> Result<ParsedQuery> {
    // SORT <tbl> BY c1,c2 IN d1,d2
    if tokens.len() < 6 || tokens[2] != "BY" {
        return Err(syntax("expected: SORT <table> BY <columns> IN <orders>"));
    }
    let in_pos = tokens
        .iter()
        .position(|t| t == "IN")
        .ok_or_else(|| syntax("SORT requires IN"))?;
    if in_pos <= 3 || in_pos + 1 >= tokens.len() {
        return Err(syntax("expected: SORT <table> BY <columns> IN <orders>"));
    }

    let columns = &tokens[3..in_pos];
    let orders = &tokens[in_pos + 1..];
    if columns.len() != orders.len() {
        return Err(syntax(format!(
            "SORT has {} column(s) but {} order(s)",
            columns.len(),
            orders.len()
        )));
    }
    let mut keys = Vec::with_capacity(columns.len());
    for (column, order) in columns.iter().zip(orders) {
        let order = SortOrder::parse(order)
            .ok_or_else(|| syntax(format!("expected ASC or DESC, got '{order}'")))?;
        keys.push((column.clone(), order));
    }
    Ok(ParsedQuery::Sort {
        table: tokens[1].clone(),
        keys,
    })
}

fn parse_index(tokens: &[String]) -> Result<ParsedQuery> {
    // INDEX ON col FROM tbl USING BTREE|NOTHING
    if tokens.len() != 7 || tokens[1] != "ON" || tokens[3] != "FROM" || tokens[5] != "USING" {
        return Err(syntax(
            "expected: INDEX ON <col> FROM <table> USING BTREE|NOTHING",
        ));
    }
    let strategy = match tokens[6].as_str() {
        "BTREE" => IndexStrategy::BTree,
        "NOTHING" => IndexStrategy::Nothing,
        other => return Err(syntax(format!("unknown indexing strategy '{other}'"))),
    };
    Ok(ParsedQuery::Index {
        table: tokens[4].clone(),
        column: tokens[2].clone(),
        strategy,
    })
}

fn parse_insert(tokens: &[String]) -> Result<ParsedQuery> {
    // INSERT INTO tbl ( c = v, c = v, ... )
    if tokens.len() < 4 || tokens[1] != "INTO" {
        return Err(syntax("expected: INSERT INTO <table> ( <col> = <int>, ... )"));
    }
    let table = tokens[2].clone();

    // Parentheses may arrive standalone or glued to neighbors.
    let mut body = Vec::new();
    for token in &tokens[3..] {
        let trimmed = token.trim_matches(|c| c == '(' || c == ')');
        if !trimmed.is_empty() {
            body.push(trimmed.to_string());
        }
    }
    if body.is_empty() || body.len() % 3 != 0 {
        return Err(syntax("expected: INSERT INTO <table> ( <col> = <int>, ... )"));
    }

    let mut assignments = Vec::new();
    for triple in body.chunks_exact(3) {
        if triple[1] != "=" {
            return Err(syntax(format!(
                "expected '<col> = <int>', got '{} {} {}'",
                triple[0], triple[1], triple[2]
            )));
        }
        let value = parse_int(&triple[2], "INSERT value")?;
        assignments.push((triple[0].clone(), value));
    }
    Ok(ParsedQuery::Insert { table, assignments })
}

fn parse_update(tokens: &[String]) -> Result<ParsedQuery> {
    // UPDATE tbl WHERE c1 op v1 SET c2 = v2
    if tokens.len() != 10 || tokens[2] != "WHERE" || tokens[6] != "SET" || tokens[8] != "=" {
        return Err(syntax(
            "expected: UPDATE <table> WHERE <col> <op> <int> SET <col> = <int>",
        ));
    }
    Ok(ParsedQuery::Update {
        table: tokens[1].clone(),
        condition: Condition {
            column: tokens[3].clone(),
            op: parse_operator(&tokens[4])?,
            value: parse_int(&tokens[5], "UPDATE condition")?,
        },
        target_column: tokens[7].clone(),
        value: parse_int(&tokens[9], "UPDATE SET")?,
    })
}

fn parse_delete(tokens: &[String]) -> Result<ParsedQuery> {
    // DELETE FROM tbl WHERE col op v
    if tokens.len() != 7 || tokens[1] != "FROM" || tokens[3] != "WHERE" {
        return Err(syntax("expected: DELETE FROM <table> WHERE <col> <op> <int>"));
    }
    Ok(ParsedQuery::Delete {
        table: tokens[2].clone(),
        condition: Condition {
            column: tokens[4].clone(),
            op: parse_operator(&tokens[5])?,
            value: parse_int(&tokens[6], "DELETE condition")?,
        },
    })
}
