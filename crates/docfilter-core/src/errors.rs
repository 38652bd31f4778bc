use crate::model::{SqlType, ValueKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("document type not registered: {0}")]
    UnknownDocumentType(String),
    #[error("unknown field '{path}' on document type '{doc_type}'")]
    UnknownField { doc_type: String, path: String },
    #[error("operator {op} is not supported for '{path}': {detail}")]
    UnsupportedOperator {
        path: String,
        op: String,
        detail: String,
    },
    #[error("column {column} ({sql_type}) cannot serve {op} on field '{path}' ({kind})")]
    StorageTypeMismatch {
        path: String,
        column: String,
        sql_type: SqlType,
        kind: ValueKind,
        op: String,
    },
    #[error("invalid operand for field '{path}': expected {expected}, got {found}")]
    InvalidOperand {
        path: String,
        expected: ValueKind,
        found: String,
    },
    #[error("empty predicate is not allowed")]
    EmptyPredicate,
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

pub type Result<T> = std::result::Result<T, FilterError>;
