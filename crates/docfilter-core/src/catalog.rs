use crate::errors::{FilterError, Result};
use crate::model::{DocumentTypeDescriptor, FieldDescriptor, SqlType, StorageStrategy, ValueKind};
use crate::util::column_name_for;
use std::collections::{HashMap, HashSet};

/// Read-only field metadata for every registered document type.
///
/// Built once at configuration time and shared (typically behind an `Arc`)
/// by every translation.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    types: HashMap<String, DocumentTypeDescriptor>,
}

impl FieldCatalog {
    pub fn new(descriptors: Vec<DocumentTypeDescriptor>) -> Result<Self> {
        let mut types = HashMap::new();
        for desc in descriptors {
            validate(&desc)?;
            let name = desc.name.clone();
            if types.insert(name.clone(), desc).is_some() {
                return Err(FilterError::InvalidCatalog(format!(
                    "document type {} registered twice",
                    name
                )));
            }
        }
        Ok(Self { types })
    }

    /// Load a catalog from a JSON array of document type descriptors.
    pub fn from_json(raw: &str) -> Result<Self> {
        let descriptors: Vec<DocumentTypeDescriptor> = serde_json::from_str(raw)
            .map_err(|e| FilterError::InvalidCatalog(e.to_string()))?;
        Self::new(descriptors)
    }

    pub fn describe(&self, doc_type: &str) -> Result<&DocumentTypeDescriptor> {
        self.types
            .get(doc_type)
            .ok_or_else(|| FilterError::UnknownDocumentType(doc_type.to_string()))
    }

    pub fn resolve(&self, doc_type: &str, path: &str) -> Result<&FieldDescriptor> {
        self.describe(doc_type)?
            .field(path)
            .ok_or_else(|| FilterError::UnknownField {
                doc_type: doc_type.to_string(),
                path: path.to_string(),
            })
    }

    pub fn document_types(&self) -> impl Iterator<Item = &DocumentTypeDescriptor> {
        self.types.values()
    }
}

fn validate(desc: &DocumentTypeDescriptor) -> Result<()> {
    if desc.name.is_empty() || desc.table.is_empty() {
        return Err(FilterError::InvalidCatalog(
            "document type needs a name and a table".into(),
        ));
    }
    let mut paths = HashSet::new();
    let mut columns = HashSet::new();
    for field in &desc.fields {
        if field.path.split('.').any(str::is_empty) {
            return Err(FilterError::InvalidCatalog(format!(
                "{}: malformed property path '{}'",
                desc.name, field.path
            )));
        }
        if !paths.insert(field.path.as_str()) {
            return Err(FilterError::InvalidCatalog(format!(
                "{}: field {} declared twice",
                desc.name, field.path
            )));
        }
        if let Some((column, sql_type)) = field.column() {
            if !columns.insert(column) {
                return Err(FilterError::InvalidCatalog(format!(
                    "{}: column {} used by more than one field",
                    desc.name, column
                )));
            }
            if !field.kind.can_store_in(sql_type) {
                return Err(FilterError::StorageTypeMismatch {
                    path: field.path.clone(),
                    column: column.to_string(),
                    sql_type,
                    kind: field.kind,
                    op: "storage".into(),
                });
            }
        }
    }
    if desc.id().is_none() {
        return Err(FilterError::InvalidCatalog(format!(
            "{}: primary key field {} is not declared",
            desc.name, desc.id_field
        )));
    }
    Ok(())
}

/// Fluent configuration of one document type.
#[derive(Debug, Clone)]
pub struct DocumentMapping {
    desc: DocumentTypeDescriptor,
    errors: Vec<FilterError>,
}

impl DocumentMapping {
    /// Starts with table `mt_doc_<name>` and a uuid `Id` key kept in column `id`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table = format!("mt_doc_{}", name.to_ascii_lowercase());
        Self {
            desc: DocumentTypeDescriptor {
                table,
                id_field: "Id".into(),
                fields: vec![FieldDescriptor::duplicated(
                    "Id",
                    ValueKind::Uuid,
                    "id",
                    SqlType::Uuid,
                )],
                name,
            },
            errors: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.desc.table = table.into();
        self
    }

    /// Replace the primary key with `path` of `kind`, still kept in column `id`.
    pub fn id(mut self, path: impl Into<String>, kind: ValueKind) -> Self {
        let path = path.into();
        let old = std::mem::replace(&mut self.desc.id_field, path.clone());
        self.desc.fields.retain(|f| f.path != old);
        self.desc.fields.insert(
            0,
            FieldDescriptor::duplicated(path, kind, "id", kind.default_column_type()),
        );
        self
    }

    pub fn field(mut self, path: impl Into<String>, kind: ValueKind) -> Self {
        self.desc.fields.push(FieldDescriptor::json(path, kind));
        self
    }

    /// Duplicate an already declared field into a column named after its path,
    /// typed by the field's kind.
    pub fn duplicate(self, path: &str) -> Self {
        let sql_type = self
            .desc
            .field(path)
            .map(|f| f.kind.default_column_type())
            .unwrap_or(SqlType::Text);
        self.duplicate_as(path, column_name_for(path), sql_type)
    }

    pub fn duplicate_as(mut self, path: &str, column: impl Into<String>, sql_type: SqlType) -> Self {
        match self.desc.fields.iter_mut().find(|f| f.path == path) {
            Some(field) => {
                field.storage = StorageStrategy::DuplicatedColumn {
                    column: column.into(),
                    sql_type,
                };
            }
            None => self.errors.push(FilterError::UnknownField {
                doc_type: self.desc.name.clone(),
                path: path.to_string(),
            }),
        }
        self
    }

    fn finish(mut self) -> Result<DocumentTypeDescriptor> {
        match self.errors.drain(..).next() {
            Some(err) => Err(err),
            None => Ok(self.desc),
        }
    }
}

#[derive(Debug, Default)]
pub struct CatalogBuilder {
    mappings: Vec<DocumentMapping>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(DocumentMapping) -> DocumentMapping,
    ) -> Self {
        self.mappings.push(configure(DocumentMapping::new(name)));
        self
    }

    pub fn build(self) -> Result<FieldCatalog> {
        let descriptors = self
            .mappings
            .into_iter()
            .map(DocumentMapping::finish)
            .collect::<Result<Vec<_>>>()?;
        FieldCatalog::new(descriptors)
    }
}
