//! Storage-aware filter representation produced by the compiler and
//! consumed by the emitter (and by anything that evaluates filters directly).

use docfilter_core::{CompareOp, SqlType, SqlValue, ValueKind};
use serde::Serialize;

/// How a field's value is read from a stored row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlExpr {
    /// Text at a path of the JSON body (`->>`); missing or JSON null is SQL NULL.
    JsonText { segments: Vec<String> },
    /// A duplicated column read as-is.
    Column(String),
    Cast { inner: Box<SqlExpr>, to: SqlType },
    /// `inner AT TIME ZONE 'UTC'`: turns a UTC wall clock into an instant and back.
    AtUtc(Box<SqlExpr>),
}

/// A field resolved to its storage-access expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAccess {
    pub path: String,
    pub kind: ValueKind,
    pub expr: SqlExpr,
    /// SQL type `expr` evaluates to.
    pub sql_type: SqlType,
}

/// A bound parameter and the type it is declared as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub value: SqlValue,
    pub sql_type: SqlType,
}

impl Param {
    pub fn new(value: SqlValue, sql_type: SqlType) -> Self {
        Self { value, sql_type }
    }
}

/// Compiled filter tree.
///
/// An empty `And` is always true and an empty `Or` is always false.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        field: FieldAccess,
        op: CompareOp,
        param: Param,
    },
    CompareFields {
        left: FieldAccess,
        op: CompareOp,
        right: FieldAccess,
    },
    In {
        field: FieldAccess,
        params: Vec<Param>,
        negated: bool,
    },
    Between {
        field: FieldAccess,
        low: Param,
        high: Param,
    },
    IsNull {
        field: FieldAccess,
        negated: bool,
    },
    Like {
        field: FieldAccess,
        pattern: Param,
        case_insensitive: bool,
    },
}

impl Filter {
    pub fn always() -> Self {
        Filter::And(Vec::new())
    }

    pub fn never() -> Self {
        Filter::Or(Vec::new())
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Filter::And(children) if children.is_empty())
    }

    /// Number of leaf comparisons.
    pub fn leaf_count(&self) -> usize {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                children.iter().map(Filter::leaf_count).sum()
            }
            Filter::Not(inner) => inner.leaf_count(),
            _ => 1,
        }
    }

    /// Parameters in left-to-right leaf order, the order the emitter binds them.
    pub fn params(&self) -> Vec<&Param> {
        let mut out = Vec::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params<'a>(&'a self, out: &mut Vec<&'a Param>) {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for c in children {
                    c.collect_params(out);
                }
            }
            Filter::Not(inner) => inner.collect_params(out),
            Filter::Compare { param, .. } => out.push(param),
            Filter::In { params, .. } => out.extend(params.iter()),
            Filter::Between { low, high, .. } => {
                out.push(low);
                out.push(high);
            }
            Filter::Like { pattern, .. } => out.push(pattern),
            Filter::CompareFields { .. } | Filter::IsNull { .. } => {}
        }
    }
}
