use crate::query::OpClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical type of a document property, independent of how it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Uuid,
    /// Wall-clock timestamp with no zone attached.
    DatetimeNaive,
    /// Timestamp whose stored value is always in UTC.
    DatetimeUtc,
    /// Timestamp that keeps the offset it was written with.
    DatetimeOffset,
}

impl ValueKind {
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ValueKind::DatetimeNaive | ValueKind::DatetimeUtc | ValueKind::DatetimeOffset
        )
    }

    pub fn supports(self, class: OpClass) -> bool {
        match class {
            OpClass::Equality | OpClass::Null => true,
            OpClass::Ordering => !matches!(self, ValueKind::Boolean | ValueKind::Uuid),
            OpClass::Substring => self == ValueKind::String,
        }
    }

    /// Cast applied after `->>` extraction. `None` keeps the extracted text.
    pub fn json_cast(self) -> Option<SqlType> {
        match self {
            ValueKind::String => None,
            ValueKind::Integer => Some(SqlType::BigInt),
            ValueKind::Float => Some(SqlType::DoublePrecision),
            ValueKind::Boolean => Some(SqlType::Boolean),
            ValueKind::Uuid => Some(SqlType::Uuid),
            // UTC values are serialized in UTC, so the wall clock is the instant.
            ValueKind::DatetimeNaive | ValueKind::DatetimeUtc => Some(SqlType::Timestamp),
            ValueKind::DatetimeOffset => Some(SqlType::TimestampTz),
        }
    }

    pub fn default_column_type(self) -> SqlType {
        self.json_cast().unwrap_or(SqlType::Text)
    }

    /// Type both sides are brought to when two fields are compared.
    pub fn comparison_type(self) -> SqlType {
        match self {
            ValueKind::DatetimeUtc | ValueKind::DatetimeOffset => SqlType::TimestampTz,
            other => other.default_column_type(),
        }
    }

    pub fn can_store_in(self, sql_type: SqlType) -> bool {
        use SqlType::*;
        match self {
            ValueKind::String => sql_type == Text,
            ValueKind::Integer => matches!(sql_type, Integer | BigInt | Text),
            ValueKind::Float => sql_type == DoublePrecision,
            ValueKind::Boolean => matches!(sql_type, Boolean | Text),
            ValueKind::Uuid => matches!(sql_type, Uuid | Text),
            ValueKind::DatetimeNaive => sql_type == Timestamp,
            ValueKind::DatetimeUtc => matches!(sql_type, Timestamp | TimestampTz),
            ValueKind::DatetimeOffset => sql_type == TimestampTz,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Uuid => "uuid",
            ValueKind::DatetimeNaive => "datetime_naive",
            ValueKind::DatetimeUtc => "datetime_utc",
            ValueKind::DatetimeOffset => "datetime_offset",
        };
        f.write_str(s)
    }
}

/// PostgreSQL types used for duplicated columns and bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SqlType {
    Text,
    Integer,
    BigInt,
    DoublePrecision,
    Boolean,
    Uuid,
    Timestamp,
    TimestampTz,
}

impl SqlType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            SqlType::Integer | SqlType::BigInt | SqlType::DoublePrecision
        )
    }

    /// Whether ordering on this type follows the natural order of `kind`.
    /// Text columns holding numbers or identifiers sort lexicographically.
    pub fn orders_like(self, kind: ValueKind) -> bool {
        self != SqlType::Text || kind == ValueKind::String
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SqlType::Text => "text",
            SqlType::Integer => "integer",
            SqlType::BigInt => "bigint",
            SqlType::DoublePrecision => "double precision",
            SqlType::Boolean => "boolean",
            SqlType::Uuid => "uuid",
            SqlType::Timestamp => "timestamp without time zone",
            SqlType::TimestampTz => "timestamp with time zone",
        };
        f.write_str(s)
    }
}

impl FromStr for SqlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let t = match normalized.as_str() {
            "text" | "varchar" | "character varying" => SqlType::Text,
            "integer" | "int" | "int4" => SqlType::Integer,
            "bigint" | "int8" => SqlType::BigInt,
            "double precision" | "double" | "float8" => SqlType::DoublePrecision,
            "boolean" | "bool" => SqlType::Boolean,
            "uuid" => SqlType::Uuid,
            "timestamp" | "timestamp without time zone" => SqlType::Timestamp,
            "timestamptz" | "timestamp with time zone" => SqlType::TimestampTz,
            _ => return Err(format!("unknown sql type: {}", s)),
        };
        Ok(t)
    }
}

impl TryFrom<String> for SqlType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SqlType> for String {
    fn from(value: SqlType) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StorageStrategy {
    JsonExtracted,
    DuplicatedColumn { column: String, sql_type: SqlType },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Dotted property path inside the document body, e.g. `Address.City`.
    pub path: String,
    pub kind: ValueKind,
    #[serde(flatten)]
    pub storage: StorageStrategy,
}

impl FieldDescriptor {
    pub fn json(path: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            path: path.into(),
            kind,
            storage: StorageStrategy::JsonExtracted,
        }
    }

    pub fn duplicated(
        path: impl Into<String>,
        kind: ValueKind,
        column: impl Into<String>,
        sql_type: SqlType,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            storage: StorageStrategy::DuplicatedColumn {
                column: column.into(),
                sql_type,
            },
        }
    }

    pub fn column(&self) -> Option<(&str, SqlType)> {
        match &self.storage {
            StorageStrategy::DuplicatedColumn { column, sql_type } => {
                Some((column.as_str(), *sql_type))
            }
            StorageStrategy::JsonExtracted => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTypeDescriptor {
    pub name: String,
    pub table: String,
    pub id_field: String,
    pub fields: Vec<FieldDescriptor>,
}

impl DocumentTypeDescriptor {
    pub fn field(&self, path: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.path == path)
    }

    pub fn id(&self) -> Option<&FieldDescriptor> {
        self.field(&self.id_field)
    }

    pub fn duplicated_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.column().is_some())
    }
}
