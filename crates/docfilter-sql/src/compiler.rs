use crate::filter::{Filter, Param};
use crate::resolver::{comparable_types, FieldResolver};
use docfilter_core::util::escape_like;
use docfilter_core::{
    CompareOp, Expr, FieldCatalog, FilterError, OpClass, Operand, Operator, Result, SqlType,
    SqlValue, TextOp, Value,
};

/// Turns caller expressions into [`Filter`] trees for one document type.
///
/// Holds no state between calls; compiling the same expression against the
/// same catalog always yields the same tree.
#[derive(Debug, Clone, Copy)]
pub struct PredicateCompiler<'a> {
    resolver: FieldResolver<'a>,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(catalog: &'a FieldCatalog, doc_type: &'a str) -> Self {
        Self {
            resolver: FieldResolver::new(catalog, doc_type),
        }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Filter> {
        match expr {
            Expr::And { args } => Ok(Filter::And(self.compile_all(args)?)),
            Expr::Or { args } => Ok(Filter::Or(self.compile_all(args)?)),
            Expr::Not { arg } => Ok(Filter::Not(Box::new(self.compile(arg)?))),
            Expr::Compare { left, cmp, right } => match (left, right) {
                (Operand::Field(path), Operand::Literal(value)) => {
                    self.compare(path, *cmp, value)
                }
                (Operand::Literal(value), Operand::Field(path)) => {
                    self.compare(path, cmp.flip(), value)
                }
                (Operand::Field(left), Operand::Field(right)) => {
                    self.compare_fields(left, *cmp, right)
                }
                (Operand::Literal(_), Operand::Literal(_)) => Err(FilterError::UnsupportedOperator {
                    path: "<literal>".into(),
                    op: cmp.to_string(),
                    detail: "a comparison must reference at least one field".into(),
                }),
            },
            Expr::In {
                field,
                values,
                negated,
            } => self.membership(field, values, *negated),
            Expr::Between { field, low, high } => {
                let access = self.resolver.resolve(field, Operator::Between)?;
                let low = self.resolver.coerce(&access, low)?;
                let high = self.resolver.coerce(&access, high)?;
                Ok(Filter::Between {
                    field: access,
                    low,
                    high,
                })
            }
            Expr::IsNull { field, negated } => Ok(Filter::IsNull {
                field: self.resolver.resolve(field, Operator::IsNull)?,
                negated: *negated,
            }),
            Expr::Text {
                field,
                text_op,
                value,
                case_insensitive,
            } => {
                let access = self.resolver.resolve(field, Operator::Text(*text_op))?;
                let escaped = escape_like(value);
                let pattern = match text_op {
                    TextOp::Contains => format!("%{}%", escaped),
                    TextOp::StartsWith => format!("{}%", escaped),
                    TextOp::EndsWith => format!("%{}", escaped),
                };
                Ok(Filter::Like {
                    field: access,
                    pattern: Param::new(SqlValue::Text(pattern), SqlType::Text),
                    case_insensitive: *case_insensitive,
                })
            }
        }
    }

    fn compile_all(&self, args: &[Expr]) -> Result<Vec<Filter>> {
        args.iter().map(|a| self.compile(a)).collect()
    }

    fn compare(&self, path: &str, op: CompareOp, value: &Value) -> Result<Filter> {
        if value.is_null() && op.class() == OpClass::Equality {
            return Ok(Filter::IsNull {
                field: self.resolver.resolve(path, Operator::IsNull)?,
                negated: op == CompareOp::Ne,
            });
        }
        let field = self.resolver.resolve(path, Operator::Compare(op))?;
        let param = self.resolver.coerce(&field, value)?;
        Ok(Filter::Compare { field, op, param })
    }

    fn compare_fields(&self, left: &str, op: CompareOp, right: &str) -> Result<Filter> {
        let operator = Operator::Compare(op);
        let l = self.resolver.resolve_canonical(left, operator)?;
        let r = self.resolver.resolve_canonical(right, operator)?;
        if !comparable_types(l.sql_type, r.sql_type) {
            return Err(FilterError::UnsupportedOperator {
                path: format!("{} {} {}", left, op, right),
                op: op.to_string(),
                detail: format!("{} and {} values do not compare", l.kind, r.kind),
            });
        }
        Ok(Filter::CompareFields {
            left: l,
            op,
            right: r,
        })
    }

    fn membership(&self, path: &str, values: &[Value], negated: bool) -> Result<Filter> {
        let field = self.resolver.resolve(path, Operator::In)?;
        let has_null = values.iter().any(Value::is_null);
        let params = values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| self.resolver.coerce(&field, v))
            .collect::<Result<Vec<_>>>()?;

        match (has_null, params.is_empty()) {
            (false, false) => {
                return Ok(Filter::In {
                    field,
                    params,
                    negated,
                })
            }
            (false, true) if negated => return Ok(Filter::always()),
            (false, true) => return Ok(Filter::never()),
            _ => {}
        }
        // a null member means `IS NULL`, the same as `= null` on its own
        let mut branches = Vec::new();
        if !params.is_empty() {
            branches.push(Filter::In {
                field: field.clone(),
                params,
                negated: false,
            });
        }
        if has_null {
            branches.push(Filter::IsNull {
                field,
                negated: false,
            });
        }
        let positive = if branches.len() == 1 {
            branches.remove(0)
        } else {
            Filter::Or(branches)
        };
        Ok(if negated {
            Filter::Not(Box::new(positive))
        } else {
            positive
        })
    }
}
