//! Grouping and aggregate evaluation.
//!
//! Groups are keyed by the stringified grouping values joined with `|`
//! (null stringifies to `"NULL"`), and emitted in first-seen order so the
//! output is deterministic for deterministic input.
//!
//! Non-aggregated projections that are not grouping keys are accepted with
//! first-row semantics rather than rejected.

use super::eval::{compare_values, lookup, value_to_string};
use scout_common::models::Row;
use scout_sql::ast::{Aggregate, SelectStatement};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Collapse `rows` into one row per group (or a single row when there is
/// no GROUP BY). Aggregate values are keyed by alias or `AGG(column)`.
pub fn aggregate_rows(stmt: &SelectStatement, rows: &[Row]) -> Vec<Row> {
    match &stmt.group_by {
        Some(keys) if !keys.is_empty() => {
            let mut order: Vec<String> = Vec::new();
            let mut groups: HashMap<String, Vec<&Row>> = HashMap::new();
            for row in rows {
                let key = keys
                    .iter()
                    .map(|k| lookup(row, k).map(value_to_string).unwrap_or_else(|| "NULL".to_string()))
                    .collect::<Vec<_>>()
                    .join("|");
                let group = groups.entry(key.clone()).or_default();
                if group.is_empty() {
                    order.push(key);
                }
                group.push(row);
            }
            order
                .iter()
                .filter_map(|key| groups.get(key).map(|group| group_row(stmt, keys, group)))
                .collect()
        }
        _ => {
            let all: Vec<&Row> = rows.iter().collect();
            vec![global_row(stmt, &all)]
        }
    }
}

fn group_row(stmt: &SelectStatement, keys: &[String], group: &[&Row]) -> Row {
    let mut out = Row::new();
    let first = group.first();

    for key in keys {
        let value = first
            .and_then(|row| lookup(row, key))
            .cloned()
            .unwrap_or(Value::Null);
        out.insert(key.clone(), value);
    }

    for projection in &stmt.columns {
        match projection.aggregate {
            Some(agg) => {
                out.insert(projection.output_key(), compute(agg, &projection.name, group));
            }
            None if projection.name != "*" => {
                // First-row semantics for non-grouped projections
                let value = first
                    .and_then(|row| lookup(row, &projection.name))
                    .cloned()
                    .unwrap_or(Value::Null);
                out.insert(projection.output_key(), value);
            }
            None => {}
        }
    }
    out
}

/// Without GROUP BY the output is a single row holding only the
/// aggregate values.
fn global_row(stmt: &SelectStatement, rows: &[&Row]) -> Row {
    let mut out = Row::new();
    for projection in &stmt.columns {
        if let Some(agg) = projection.aggregate {
            out.insert(projection.output_key(), compute(agg, &projection.name, rows));
        }
    }
    out
}

fn compute(agg: Aggregate, column: &str, group: &[&Row]) -> Value {
    match agg {
        Aggregate::Count => {
            if column == "*" {
                Value::from(group.len())
            } else {
                let non_null = group
                    .iter()
                    .filter(|row| matches!(lookup(row, column), Some(v) if !v.is_null()))
                    .count();
                Value::from(non_null)
            }
        }
        Aggregate::Sum => {
            // Integer-valued inputs keep an integer sum
            let mut int_sum: i64 = 0;
            let mut float_sum: f64 = 0.0;
            let mut all_integers = true;
            let mut seen = false;
            for row in group {
                let Some(value) = lookup(row, column) else {
                    continue;
                };
                if let Some(i) = value.as_i64() {
                    int_sum = int_sum.saturating_add(i);
                    float_sum += i as f64;
                    seen = true;
                } else if let Some(f) = value.as_f64() {
                    all_integers = false;
                    float_sum += f;
                    seen = true;
                }
            }
            if !seen {
                Value::from(0)
            } else if all_integers {
                Value::from(int_sum)
            } else {
                Value::from(float_sum)
            }
        }
        Aggregate::Avg => {
            let values: Vec<f64> = group
                .iter()
                .filter_map(|row| lookup(row, column).and_then(Value::as_f64))
                .collect();
            if values.is_empty() {
                Value::Null
            } else {
                Value::from(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Aggregate::Min => extremum(column, group, Ordering::Less),
        Aggregate::Max => extremum(column, group, Ordering::Greater),
    }
}

fn extremum(column: &str, group: &[&Row], wanted: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for row in group {
        let Some(value) = lookup(row, column) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        best = match best {
            None => Some(value),
            Some(current) if compare_values(value, current) == wanted => Some(value),
            Some(current) => Some(current),
        };
    }
    best.cloned().unwrap_or(Value::Null)
}
