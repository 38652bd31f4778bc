use crate::filter::{FieldAccess, Param, SqlExpr};
use docfilter_core::util::split_path;
use docfilter_core::{
    FieldCatalog, FieldDescriptor, FilterError, OpClass, Operator, Result, SqlType, SqlValue,
    StorageStrategy, Value, ValueKind,
};
use tracing::{trace, warn};

/// Decides how each field is read and how literals compared against it are coerced.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    catalog: &'a FieldCatalog,
    doc_type: &'a str,
}

impl<'a> FieldResolver<'a> {
    pub fn new(catalog: &'a FieldCatalog, doc_type: &'a str) -> Self {
        Self { catalog, doc_type }
    }

    pub fn doc_type(&self) -> &'a str {
        self.doc_type
    }

    /// Storage access for comparing `path` against literals.
    ///
    /// The field side stays bare so a duplicated column remains indexable; the
    /// literal is brought to the access type by [`FieldResolver::coerce`].
    pub fn resolve(&self, path: &str, op: Operator) -> Result<FieldAccess> {
        let field = self.catalog.resolve(self.doc_type, path)?;
        check_operator(field, op)?;
        if let Some((column, sql_type)) = field.column() {
            check_column(field, column, sql_type, op)?;
        }
        let access = native_access(field);
        trace!(
            doc_type = self.doc_type,
            path,
            op = %op,
            sql_type = %access.sql_type,
            "resolved field"
        );
        Ok(access)
    }

    /// Storage access for comparing `path` against another field.
    ///
    /// Both sides are brought to the kind's comparison type so the result does
    /// not depend on which side is duplicated.
    pub fn resolve_canonical(&self, path: &str, op: Operator) -> Result<FieldAccess> {
        let field = self.catalog.resolve(self.doc_type, path)?;
        check_operator(field, op)?;
        if let Some((column, sql_type)) = field.column() {
            check_storable(field, column, sql_type, op)?;
        }
        let access = native_access(field);
        let target = field.kind.comparison_type();
        if comparable_types(access.sql_type, target) {
            return Ok(access);
        }
        let FieldAccess {
            path,
            kind,
            expr,
            sql_type,
        } = access;
        let expr = if kind == ValueKind::DatetimeUtc && sql_type == SqlType::Timestamp {
            SqlExpr::AtUtc(Box::new(expr))
        } else {
            SqlExpr::Cast {
                inner: Box::new(expr),
                to: target,
            }
        };
        Ok(FieldAccess {
            path,
            kind,
            expr,
            sql_type: target,
        })
    }

    /// Coerce a caller literal to the type of `access`.
    pub fn coerce(&self, access: &FieldAccess, value: &Value) -> Result<Param> {
        let declared = param_type(access.sql_type);
        if value.is_null() {
            return Ok(Param::new(SqlValue::Null, declared));
        }
        let invalid = || FilterError::InvalidOperand {
            path: access.path.clone(),
            expected: access.kind,
            found: value.type_name().to_string(),
        };
        let coerced = match (access.kind, value) {
            (ValueKind::String, Value::String(s)) => SqlValue::Text(s.clone()),
            (ValueKind::Integer, Value::Int(i)) => SqlValue::Int(*i),
            (ValueKind::Float, Value::Int(i)) => SqlValue::Float(*i as f64),
            (ValueKind::Float, Value::Float(f)) => SqlValue::Float(*f),
            (ValueKind::Boolean, Value::Bool(b)) => SqlValue::Bool(*b),
            (ValueKind::Uuid, Value::Uuid(u)) => SqlValue::Uuid(*u),
            (ValueKind::Uuid, Value::String(s)) => {
                SqlValue::Uuid(uuid::Uuid::parse_str(s).map_err(|_| invalid())?)
            }
            (ValueKind::DatetimeNaive, v) => {
                let wall = v.to_wall_clock().ok_or_else(invalid)?;
                if v.is_zone_aware() {
                    // Zone consistency is left to the caller.
                    warn!(
                        path = %access.path,
                        literal = v.type_name(),
                        "zone-aware literal compared with a naive timestamp field; using its wall clock"
                    );
                }
                SqlValue::Timestamp(wall)
            }
            (ValueKind::DatetimeUtc | ValueKind::DatetimeOffset, v) => {
                let instant = v.to_instant().ok_or_else(invalid)?;
                match access.sql_type {
                    SqlType::Timestamp => SqlValue::Timestamp(instant.naive_utc()),
                    _ => SqlValue::TimestampTz(instant),
                }
            }
            _ => return Err(invalid()),
        };
        let coerced = match (access.sql_type, coerced) {
            (SqlType::Text, SqlValue::Int(i)) => SqlValue::Text(i.to_string()),
            (SqlType::Text, SqlValue::Bool(b)) => SqlValue::Text(b.to_string()),
            (SqlType::Text, SqlValue::Uuid(u)) => SqlValue::Text(u.to_string()),
            (_, other) => other,
        };
        Ok(Param::new(coerced, declared))
    }
}

/// Parameters against `integer` columns are declared `bigint`: every i64
/// literal binds, and PostgreSQL compares int4 with int8 directly.
fn param_type(access: SqlType) -> SqlType {
    match access {
        SqlType::Integer => SqlType::BigInt,
        other => other,
    }
}

fn native_access(field: &FieldDescriptor) -> FieldAccess {
    let (expr, sql_type) = match &field.storage {
        StorageStrategy::DuplicatedColumn { column, sql_type } => {
            (SqlExpr::Column(column.clone()), *sql_type)
        }
        StorageStrategy::JsonExtracted => {
            let text = SqlExpr::JsonText {
                segments: split_path(&field.path)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            match field.kind.json_cast() {
                Some(to) => (
                    SqlExpr::Cast {
                        inner: Box::new(text),
                        to,
                    },
                    to,
                ),
                None => (text, SqlType::Text),
            }
        }
    };
    FieldAccess {
        path: field.path.clone(),
        kind: field.kind,
        expr,
        sql_type,
    }
}

fn check_operator(field: &FieldDescriptor, op: Operator) -> Result<()> {
    if field.kind.supports(op.class()) {
        Ok(())
    } else {
        Err(FilterError::UnsupportedOperator {
            path: field.path.clone(),
            op: op.to_string(),
            detail: format!("not defined for {} values", field.kind),
        })
    }
}

fn check_storable(field: &FieldDescriptor, column: &str, sql_type: SqlType, op: Operator) -> Result<()> {
    if field.kind.can_store_in(sql_type) {
        Ok(())
    } else {
        Err(mismatch(field, column, sql_type, op))
    }
}

fn check_column(field: &FieldDescriptor, column: &str, sql_type: SqlType, op: Operator) -> Result<()> {
    check_storable(field, column, sql_type, op)?;
    let honored = match op.class() {
        OpClass::Ordering => sql_type.orders_like(field.kind),
        OpClass::Substring => sql_type == SqlType::Text,
        OpClass::Equality | OpClass::Null => true,
    };
    if honored {
        Ok(())
    } else {
        Err(mismatch(field, column, sql_type, op))
    }
}

fn mismatch(field: &FieldDescriptor, column: &str, sql_type: SqlType, op: Operator) -> FilterError {
    FilterError::StorageTypeMismatch {
        path: field.path.clone(),
        column: column.to_string(),
        sql_type,
        kind: field.kind,
        op: op.to_string(),
    }
}

/// Types that compare directly with no conversion.
pub(crate) fn comparable_types(a: SqlType, b: SqlType) -> bool {
    a == b || (a.is_numeric() && b.is_numeric())
}
