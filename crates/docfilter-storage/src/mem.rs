use crate::eval::{cast, eval_expr, eval_filter, json_pointer_from_path, Row};
use crate::traits::{Result, Storage, StoreError, StoredDocument};
use chrono::DateTime;
use docfilter_core::util::split_path;
use docfilter_core::{
    DocumentTypeDescriptor, Expr, FieldCatalog, FieldDescriptor, SqlType, ValueKind,
};
use docfilter_sql::{Filter, SqlExpr, TranslateOptions, Translator};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Reference document store: keeps bodies and duplicated columns in memory
/// and answers queries by evaluating compiled filters.
#[derive(Clone)]
pub struct InMemoryStore {
    translator: Translator,
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    // key: (doc_type, id)
    data: HashMap<(String, String), StoredDocument>,
    // per-document-type write counters
    versions: HashMap<String, u64>,
}

impl InMemoryStore {
    pub fn new(catalog: Arc<FieldCatalog>) -> Self {
        Self::with_options(catalog, TranslateOptions::default())
    }

    pub fn with_options(catalog: Arc<FieldCatalog>, options: TranslateOptions) -> Self {
        Self {
            translator: Translator::new(catalog, options),
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn all_documents(&self, doc_type: &str) -> Vec<StoredDocument> {
        let inner = self.inner.read();
        let mut out: Vec<_> = inner
            .data
            .values()
            .filter(|d| d.doc_type == doc_type)
            .cloned()
            .collect();
        out.sort_by_key(|d| d.version);
        out
    }
}

fn id_key(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Put the generated id at the id field's path, creating parent objects.
fn insert_at_path(body: &mut JsonValue, path: &str, value: JsonValue) -> Result<()> {
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        return Err(StoreError::InvalidDocument("empty id path".into()));
    };
    let mut node = body;
    for seg in parents {
        let obj = node
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidDocument(format!("{} is not an object", seg)))?;
        node = obj
            .entry(seg.to_string())
            .or_insert_with(|| JsonValue::Object(Default::default()));
    }
    let obj = node
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidDocument(format!("cannot set {}", path)))?;
    obj.insert(last.to_string(), value);
    Ok(())
}

/// UTC fields are read as a UTC wall clock when extracted from JSON, so a
/// body carrying any other offset would compare wrongly.
fn check_utc_serialization(field: &FieldDescriptor, body: &JsonValue) -> Result<()> {
    if field.kind != ValueKind::DatetimeUtc {
        return Ok(());
    }
    if let Some(JsonValue::String(s)) = body.pointer(&json_pointer_from_path(&field.path)) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            if dt.offset().local_minus_utc() != 0 {
                return Err(StoreError::InvalidDocument(format!(
                    "{} must be serialized in UTC, got {}",
                    field.path, s
                )));
            }
        }
    }
    Ok(())
}

/// Values of every duplicated column, read from the body the same way the
/// JSON-extracted access would read them. Text columns holding a non-string
/// kind get the kind's canonical spelling (`true`, lowercase uuids), the form
/// literals are bound in.
fn materialize_columns(
    desc: &DocumentTypeDescriptor,
    body: &JsonValue,
) -> Result<BTreeMap<String, docfilter_core::SqlValue>> {
    let empty = BTreeMap::new();
    let row = Row {
        body,
        columns: &empty,
    };
    let mut columns = BTreeMap::new();
    for field in desc.duplicated_fields() {
        if let Some((column, sql_type)) = field.column() {
            let text = SqlExpr::JsonText {
                segments: split_path(&field.path)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            let raw = eval_expr(&text, row)?;
            let value = match field.kind.json_cast() {
                Some(typed) if sql_type == SqlType::Text => cast(cast(raw, typed)?, SqlType::Text)?,
                _ => cast(raw, sql_type)?,
            };
            columns.insert(column.to_string(), value);
        }
    }
    Ok(columns)
}

impl Storage for InMemoryStore {
    fn put(&self, doc_type: &str, mut body: JsonValue) -> Result<StoredDocument> {
        let desc = self.translator.catalog().describe(doc_type)?;
        if !body.is_object() {
            return Err(StoreError::InvalidDocument(
                "document body must be a JSON object".into(),
            ));
        }
        let id_pointer = json_pointer_from_path(&desc.id_field);
        let id = match body.pointer(&id_pointer) {
            Some(v) if !v.is_null() => id_key(v),
            _ => {
                let id_kind = desc.id().map(|f| f.kind);
                if id_kind != Some(ValueKind::Uuid) {
                    return Err(StoreError::InvalidDocument(format!(
                        "{} has no {} and ids of this kind are not generated",
                        doc_type, desc.id_field
                    )));
                }
                let id = uuid::Uuid::new_v4().to_string();
                insert_at_path(&mut body, &desc.id_field, JsonValue::String(id.clone()))?;
                id
            }
        };
        for field in &desc.fields {
            check_utc_serialization(field, &body)?;
        }
        let columns = materialize_columns(desc, &body)?;

        let mut inner = self.inner.write();
        let next = inner
            .versions
            .entry(doc_type.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(1);
        let version = *next;
        let doc = StoredDocument {
            doc_type: doc_type.to_string(),
            id: id.clone(),
            body,
            columns,
            version,
        };
        inner
            .data
            .insert((doc_type.to_string(), id.clone()), doc.clone());
        debug!(doc_type, id = %id, version, "stored document");
        Ok(doc)
    }

    fn get(&self, doc_type: &str, id: &str) -> Result<StoredDocument> {
        let inner = self.inner.read();
        inner
            .data
            .get(&(doc_type.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn delete(&self, doc_type: &str, id: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .data
            .remove(&(doc_type.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn query_filter(&self, doc_type: &str, filter: &Filter) -> Result<Vec<StoredDocument>> {
        self.translator.catalog().describe(doc_type)?;
        let mut out = Vec::new();
        for doc in self.all_documents(doc_type) {
            let row = Row {
                body: &doc.body,
                columns: &doc.columns,
            };
            if eval_filter(filter, row)? == Some(true) {
                out.push(doc);
            }
        }
        debug!(doc_type, matched = out.len(), "evaluated filter");
        Ok(out)
    }

    fn query(&self, doc_type: &str, expr: Option<&Expr>) -> Result<Vec<StoredDocument>> {
        let filter = self.translator.compile(doc_type, expr)?;
        self.query_filter(doc_type, &filter)
    }
}
