//! The statement model: an immutable value tree built by the parser and
//! consumed by the executor.
//!
//! Statements are a tagged variant with one struct per case, so executor
//! dispatch is a single match and new statement shapes are additive.

use scout_common::models::{Filter, FilterOp, OrderBy};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Trace(TraceStatement),
    Describe(DescribeStatement),
    Show(ShowStatement),
    Cache(CacheStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub columns: Vec<Projection>,
    pub from: String,
    pub joins: Vec<Join>,
    pub where_clause: Option<Predicate>,
    pub group_by: Option<Vec<String>>,
    pub having: Option<Predicate>,
    pub order_by: Option<Vec<OrderBy>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SelectStatement {
    /// Whether any projection carries an aggregate function.
    pub fn has_aggregates(&self) -> bool {
        self.columns.iter().any(|p| p.aggregate.is_some())
    }

    /// Whether the projection is the bare `*`.
    pub fn is_star(&self) -> bool {
        self.columns.len() == 1 && self.columns[0].name == "*" && self.columns[0].aggregate.is_none()
    }
}

/// One projection item: `name`, `name AS alias`, or `AGG(name) [AS alias]`.
/// `name` may be `*`, a bare identifier, or `table.column`.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub name: String,
    pub alias: Option<String>,
    pub aggregate: Option<Aggregate>,
}

impl Projection {
    /// The key this projection emits into output rows.
    pub fn output_key(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.aggregate {
            Some(agg) => format!("{}({})", agg.as_str(), self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: JoinCondition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub left_field: String,
    pub op: FilterOp,
    pub right_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// A WHERE or HAVING block: conditions joined by a single combinator.
///
/// When a clause mixes AND and OR, the last combinator token seen wins;
/// there is no precedence between the two.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub conditions: Vec<Condition>,
    pub combinator: Combinator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
    /// Upper bound for BETWEEN, unused otherwise.
    pub second_value: Option<Value>,
}

impl From<&Condition> for Filter {
    fn from(cond: &Condition) -> Self {
        Filter {
            field: cond.field.clone(),
            op: cond.op,
            value: cond.value.clone(),
            second_value: cond.second_value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceStatement {
    pub identifier: String,
    pub value: Value,
    /// Sources to follow; empty means every trace-capable source.
    pub through: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeStatement {
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowTarget {
    Tables,
    Plugins,
    Sources,
}

impl ShowTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowTarget::Tables => "TABLES",
            ShowTarget::Plugins => "PLUGINS",
            ShowTarget::Sources => "SOURCES",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShowStatement {
    pub what: ShowTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    Show,
    Clear,
    SetTtl,
}

impl CacheAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheAction::Show => "SHOW",
            CacheAction::Clear => "CLEAR",
            CacheAction::SetTtl => "SET_TTL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatement {
    pub action: CacheAction,
    pub table: Option<String>,
    pub ttl_ms: Option<u64>,
}
