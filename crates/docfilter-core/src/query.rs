use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    pub fn class(self) -> OpClass {
        match self {
            CompareOp::Eq | CompareOp::Ne => OpClass::Equality,
            _ => OpClass::Ordering,
        }
    }

    /// Operator to use once the operands swap sides: `a >= b` is `b <= a`.
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl fmt::Display for TextOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TextOp::Contains => "contains",
            TextOp::StartsWith => "starts_with",
            TextOp::EndsWith => "ends_with",
        };
        f.write_str(s)
    }
}

/// Families of operators a field kind or column type may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Equality,
    Ordering,
    Substring,
    Null,
}

/// Operator requested against a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Compare(CompareOp),
    In,
    Between,
    IsNull,
    Text(TextOp),
}

impl Operator {
    pub fn class(self) -> OpClass {
        match self {
            Operator::Compare(op) => op.class(),
            Operator::In => OpClass::Equality,
            Operator::Between => OpClass::Ordering,
            Operator::IsNull => OpClass::Null,
            Operator::Text(_) => OpClass::Substring,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Compare(op) => write!(f, "{}", op),
            Operator::In => f.write_str("in"),
            Operator::Between => f.write_str("between"),
            Operator::IsNull => f.write_str("is null"),
            Operator::Text(op) => write!(f, "{}", op),
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Field(String),
    Literal(Value),
}

/// Typed filter expression written against document properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    And { args: Vec<Expr> },
    Or { args: Vec<Expr> },
    Not { arg: Box<Expr> },
    Compare {
        left: Operand,
        cmp: CompareOp,
        right: Operand,
    },
    In {
        field: String,
        values: Vec<Value>,
        #[serde(default)]
        negated: bool,
    },
    Between {
        field: String,
        low: Value,
        high: Value,
    },
    IsNull {
        field: String,
        #[serde(default)]
        negated: bool,
    },
    Text {
        field: String,
        text_op: TextOp,
        value: String,
        #[serde(default)]
        case_insensitive: bool,
    },
}

impl Expr {
    pub fn and(args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::And {
            args: args.into_iter().collect(),
        }
    }

    pub fn or(args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Or {
            args: args.into_iter().collect(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(arg: Expr) -> Self {
        Expr::Not { arg: Box::new(arg) }
    }

    /// `field <op> value`
    pub fn cmp(field: impl Into<String>, cmp: CompareOp, value: impl Into<Value>) -> Self {
        Expr::Compare {
            left: Operand::Field(field.into()),
            cmp,
            right: Operand::Literal(value.into()),
        }
    }

    /// `value <op> field`, the shape `now >= x.Stamp` takes.
    pub fn cmp_literal(value: impl Into<Value>, cmp: CompareOp, field: impl Into<String>) -> Self {
        Expr::Compare {
            left: Operand::Literal(value.into()),
            cmp,
            right: Operand::Field(field.into()),
        }
    }

    pub fn cmp_fields(left: impl Into<String>, cmp: CompareOp, right: impl Into<String>) -> Self {
        Expr::Compare {
            left: Operand::Field(left.into()),
            cmp,
            right: Operand::Field(right.into()),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, CompareOp::Eq, value)
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Expr::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Expr::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Expr::IsNull {
            field: field.into(),
            negated: false,
        }
    }

    pub fn text(field: impl Into<String>, text_op: TextOp, value: impl Into<String>) -> Self {
        Expr::Text {
            field: field.into(),
            text_op,
            value: value.into(),
            case_insensitive: false,
        }
    }

    /// Every field path the expression references, left to right.
    pub fn field_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::And { args } | Expr::Or { args } => {
                for a in args {
                    a.collect_paths(out);
                }
            }
            Expr::Not { arg } => arg.collect_paths(out),
            Expr::Compare { left, right, .. } => {
                for side in [left, right] {
                    if let Operand::Field(p) = side {
                        out.push(p);
                    }
                }
            }
            Expr::In { field, .. }
            | Expr::Between { field, .. }
            | Expr::IsNull { field, .. }
            | Expr::Text { field, .. } => out.push(field),
        }
    }
}
