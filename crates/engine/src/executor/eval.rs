//! Predicate evaluation and value comparison.
//!
//! Comparison semantics: numeric ordering when both sides are numeric,
//! lexicographic on the string form otherwise. Null never compares equal
//! to anything, so every operator is false against null. LIKE is a
//! case-insensitive substring match, IN is membership by the same
//! equality, BETWEEN is inclusive.

use scout_common::models::{FilterOp, OrderBy, Row, SortDirection};
use scout_sql::ast::{Combinator, Condition, Predicate};
use serde_json::Value;
use std::cmp::Ordering;

/// Look a field up in a row.
///
/// Merged join rows carry both qualified (`table.column`) and unqualified
/// keys. Resolution tries the exact key, then the unqualified suffix of a
/// qualified name, then any qualified key ending in the bare name (rows
/// iterate in sorted key order, so the fallback is deterministic).
pub fn lookup<'a>(row: &'a Row, field: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(field) {
        return Some(value);
    }
    if let Some((_, bare)) = field.split_once('.') {
        return row.get(bare);
    }
    let suffix = format!(".{}", field);
    row.iter()
        .find(|(key, _)| key.ends_with(&suffix))
        .map(|(_, value)| value)
}

pub fn is_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// The string form used for grouping keys and lexicographic comparison.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Total order over scalar values: numeric when both sides are numbers,
/// string form otherwise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    value_to_string(a).cmp(&value_to_string(b))
}

/// Evaluate one condition against a row. Null fields fail every operator.
pub fn condition_matches(condition: &Condition, row: &Row) -> bool {
    let actual = match lookup(row, &condition.field) {
        Some(value) if !value.is_null() => value,
        _ => return false,
    };

    match condition.op {
        FilterOp::Eq => compare_values(actual, &condition.value) == Ordering::Equal,
        FilterOp::NotEq => compare_values(actual, &condition.value) != Ordering::Equal,
        FilterOp::Gt => compare_values(actual, &condition.value) == Ordering::Greater,
        FilterOp::Lt => compare_values(actual, &condition.value) == Ordering::Less,
        FilterOp::Gte => compare_values(actual, &condition.value) != Ordering::Less,
        FilterOp::Lte => compare_values(actual, &condition.value) != Ordering::Greater,
        FilterOp::Like => value_to_string(actual)
            .to_lowercase()
            .contains(&value_to_string(&condition.value).to_lowercase()),
        FilterOp::In => condition
            .value
            .as_array()
            .map(|list| {
                list.iter()
                    .any(|candidate| compare_values(actual, candidate) == Ordering::Equal)
            })
            .unwrap_or(false),
        FilterOp::Between => {
            let Some(high) = &condition.second_value else {
                return false;
            };
            compare_values(actual, &condition.value) != Ordering::Less
                && compare_values(actual, high) != Ordering::Greater
        }
    }
}

/// Evaluate a predicate block under its single combinator.
pub fn predicate_matches(predicate: &Predicate, row: &Row) -> bool {
    match predicate.combinator {
        Combinator::And => predicate
            .conditions
            .iter()
            .all(|c| condition_matches(c, row)),
        Combinator::Or => predicate
            .conditions
            .iter()
            .any(|c| condition_matches(c, row)),
    }
}

/// Stable multi-key sort: keys are applied in reverse so the first key is
/// the primary order, and rows with equal keys keep their input order.
pub fn sort_rows(rows: &mut [Row], keys: &[OrderBy]) {
    for key in keys.iter().rev() {
        rows.sort_by(|a, b| {
            let left = lookup(a, &key.field);
            let right = lookup(b, &key.field);
            let ordering = match (left, right) {
                (Some(l), Some(r)) => compare_values(l, r),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn condition(field: &str, op: FilterOp, value: Value) -> Condition {
        Condition {
            field: field.to_string(),
            op,
            value,
            second_value: None,
        }
    }

    #[test]
    fn test_lookup_prefers_exact_then_qualified() {
        let r = row(json!({"services.id": "svc-1", "id": "svc-1", "deployments.id": "dep-1"}));
        assert_eq!(lookup(&r, "id"), Some(&json!("svc-1")));
        assert_eq!(lookup(&r, "deployments.id"), Some(&json!("dep-1")));

        let qualified_only = row(json!({"services.status": "active"}));
        assert_eq!(lookup(&qualified_only, "status"), Some(&json!("active")));
    }

    #[test]
    fn test_numeric_vs_lexicographic() {
        assert_eq!(compare_values(&json!(9), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("9"), &json!("10")), Ordering::Greater);
        assert_eq!(compare_values(&json!(2), &json!(2.0)), Ordering::Equal);
    }

    #[test]
    fn test_null_never_matches() {
        let r = row(json!({"status": null}));
        for op in [FilterOp::Eq, FilterOp::NotEq, FilterOp::Gt, FilterOp::Like] {
            assert!(!condition_matches(&condition("status", op, json!("x")), &r));
        }
        // Missing field behaves like null
        assert!(!condition_matches(
            &condition("absent", FilterOp::Eq, json!("x")),
            &r
        ));
    }

    #[test]
    fn test_like_is_case_insensitive_substring() {
        let r = row(json!({"name": "API-Gateway"}));
        assert!(condition_matches(
            &condition("name", FilterOp::Like, json!("gateway")),
            &r
        ));
        assert!(!condition_matches(
            &condition("name", FilterOp::Like, json!("ingress")),
            &r
        ));
    }

    #[test]
    fn test_between_inclusive() {
        let r = row(json!({"cpu": 90}));
        let mut c = condition("cpu", FilterOp::Between, json!(10));
        c.second_value = Some(json!(90));
        assert!(condition_matches(&c, &r));
        c.second_value = Some(json!(89));
        assert!(!condition_matches(&c, &r));
    }

    #[test]
    fn test_predicate_combinators() {
        let r = row(json!({"a": 1, "b": 2}));
        let and = Predicate {
            conditions: vec![
                condition("a", FilterOp::Eq, json!(1)),
                condition("b", FilterOp::Eq, json!(3)),
            ],
            combinator: Combinator::And,
        };
        assert!(!predicate_matches(&and, &r));

        let or = Predicate {
            combinator: Combinator::Or,
            ..and
        };
        assert!(predicate_matches(&or, &r));
    }

    #[test]
    fn test_sort_stability() {
        let mut rows: Vec<Row> = ["c", "a", "b"]
            .iter()
            .enumerate()
            .map(|(i, name)| row(json!({"group": 1, "name": name, "seq": i})))
            .collect();
        sort_rows(
            &mut rows,
            &[OrderBy {
                field: "group".to_string(),
                direction: SortDirection::Asc,
            }],
        );
        // Equal keys keep input order
        let seqs: Vec<i64> = rows
            .iter()
            .map(|r| r["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_multi_key_sort_primary_first() {
        let mut rows: Vec<Row> = vec![
            row(json!({"env": "prod", "name": "b"})),
            row(json!({"env": "dev", "name": "z"})),
            row(json!({"env": "prod", "name": "a"})),
        ];
        sort_rows(
            &mut rows,
            &[
                OrderBy {
                    field: "env".to_string(),
                    direction: SortDirection::Asc,
                },
                OrderBy {
                    field: "name".to_string(),
                    direction: SortDirection::Asc,
                },
            ],
        );
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["z", "a", "b"]);
    }
}
