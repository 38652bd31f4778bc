use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    /// jsonb column holding the document body.
    pub data_column: String,
    /// Alias the document table is read under.
    pub table_alias: String,
    /// When false an empty predicate fails with `EmptyPredicate` instead of
    /// matching every document.
    pub allow_empty: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            data_column: "data".into(),
            table_alias: "d".into(),
            allow_empty: true,
        }
    }
}

impl TranslateOptions {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let data_column = std::env::var("DOCFILTER_DATA_COLUMN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.data_column);
        let table_alias = std::env::var("DOCFILTER_TABLE_ALIAS")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.table_alias);
        let allow_empty = std::env::var("DOCFILTER_ALLOW_EMPTY")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(defaults.allow_empty);
        Self {
            data_column,
            table_alias,
            allow_empty,
        }
    }
}
