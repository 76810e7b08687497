//! In-memory nested-loop joins.
//!
//! Merged rows carry both qualified (`table.column`) and unqualified keys;
//! where an unqualified key collides, the left-hand side wins. INNER and
//! LEFT joins scan the left relation outermost, so the left emission order
//! is preserved; RIGHT joins scan the right relation outermost for the
//! symmetric guarantee.

use super::eval::{compare_values, lookup};
use scout_common::models::{FilterOp, Row};
use scout_sql::ast::{JoinCondition, JoinKind};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Add `table.column` aliases alongside a base table's unqualified keys.
///
/// Applied to the left relation once before the first join so ON clauses
/// can address the base table by name.
pub fn qualify_rows(rows: Vec<Row>, table: &str) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            let mut out = row.clone();
            for (key, value) in row {
                if !key.contains('.') {
                    out.insert(format!("{}.{}", table, key), value);
                }
            }
            out
        })
        .collect()
}

/// Join the accumulated left relation with one freshly fetched right table.
///
/// `right_fields` is the right table's declared column list, used to
/// null-extend unmatched rows.
pub fn nested_loop(
    left_rows: Vec<Row>,
    right_rows: Vec<Row>,
    right_table: &str,
    right_fields: &[String],
    on: &JoinCondition,
    kind: JoinKind,
) -> Vec<Row> {
    let mut out = Vec::new();
    match kind {
        JoinKind::Inner => {
            for left in &left_rows {
                for right in &right_rows {
                    if on_matches(on, left, right, right_table) {
                        out.push(merge(left, right, right_table));
                    }
                }
            }
        }
        JoinKind::Left => {
            let null_right = null_row(right_fields.iter().cloned());
            for left in &left_rows {
                let mut matched = false;
                for right in &right_rows {
                    if on_matches(on, left, right, right_table) {
                        matched = true;
                        out.push(merge(left, right, right_table));
                    }
                }
                if !matched {
                    out.push(merge(left, &null_right, right_table));
                }
            }
        }
        JoinKind::Right => {
            let left_fields: BTreeSet<String> = left_rows
                .iter()
                .flat_map(|row| row.keys().cloned())
                .collect();
            let null_left = null_row(left_fields.into_iter());
            for right in &right_rows {
                let mut matched = false;
                for left in &left_rows {
                    if on_matches(on, left, right, right_table) {
                        matched = true;
                        out.push(merge(left, right, right_table));
                    }
                }
                if !matched {
                    out.push(merge(&null_left, right, right_table));
                }
            }
        }
    }
    out
}

fn null_row(fields: impl Iterator<Item = String>) -> Row {
    fields.map(|field| (field, Value::Null)).collect()
}

fn merge(left: &Row, right: &Row, right_table: &str) -> Row {
    let mut out = left.clone();
    for (key, value) in right {
        out.insert(format!("{}.{}", right_table, key), value.clone());
        if !out.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// Resolve one side of the ON condition. A field qualified with the right
/// table's name reads from the right row; everything else prefers the
/// accumulated left row.
fn on_value<'a>(field: &str, left: &'a Row, right: &'a Row, right_table: &str) -> Option<&'a Value> {
    if let Some((table, column)) = field.split_once('.') {
        if table == right_table {
            return right.get(column);
        }
        return lookup(left, field);
    }
    lookup(left, field).or_else(|| right.get(field))
}

fn on_matches(on: &JoinCondition, left: &Row, right: &Row, right_table: &str) -> bool {
    let lhs = on_value(&on.left_field, left, right, right_table);
    let rhs = on_value(&on.right_field, left, right, right_table);
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return false;
    };
    if lhs.is_null() || rhs.is_null() {
        return false;
    }
    let ordering = compare_values(lhs, rhs);
    match on.op {
        FilterOp::Eq => ordering == Ordering::Equal,
        FilterOp::NotEq => ordering != Ordering::Equal,
        FilterOp::Gt => ordering == Ordering::Greater,
        FilterOp::Lt => ordering == Ordering::Less,
        FilterOp::Gte => ordering != Ordering::Less,
        FilterOp::Lte => ordering != Ordering::Greater,
        _ => false,
    }
}
