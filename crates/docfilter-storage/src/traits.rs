use docfilter_core::{Expr, FilterError, SqlType, SqlValue};
use docfilter_sql::Filter;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("cannot cast {value} to {to}")]
    Cast { value: String, to: SqlType },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A document body plus the duplicated columns maintained alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub doc_type: String,
    pub id: String,
    pub body: JsonValue,
    pub columns: BTreeMap<String, SqlValue>,
    /// Monotonic per document type, bumped on every write.
    pub version: u64,
}

pub trait Storage: Send + Sync + 'static {
    /// Insert or replace a document; a missing uuid id is generated.
    fn put(&self, doc_type: &str, body: JsonValue) -> Result<StoredDocument>;
    fn get(&self, doc_type: &str, id: &str) -> Result<StoredDocument>;
    fn delete(&self, doc_type: &str, id: &str) -> Result<()>;

    /// Documents matching an already compiled filter, oldest write first.
    fn query_filter(&self, doc_type: &str, filter: &Filter) -> Result<Vec<StoredDocument>>;

    fn query(&self, doc_type: &str, expr: Option<&Expr>) -> Result<Vec<StoredDocument>>;

    fn count(&self, doc_type: &str, expr: Option<&Expr>) -> Result<usize> {
        self.query(doc_type, expr).map(|docs| docs.len())
    }
}
