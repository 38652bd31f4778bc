pub mod compiler;
pub mod emitter;
pub mod filter;
pub mod options;
pub mod resolver;

pub use compiler::PredicateCompiler;
pub use emitter::{CompiledCommand, Emitter};
pub use filter::*;
pub use options::TranslateOptions;
pub use resolver::FieldResolver;

use docfilter_core::{Expr, FieldCatalog, FilterError, Result};
use std::sync::Arc;
use tracing::debug;

/// Entry point tying catalog, compiler and emitter together.
///
/// Cheap to clone and safe to share between threads: the catalog is
/// immutable and every call builds its own command.
#[derive(Debug, Clone)]
pub struct Translator {
    catalog: Arc<FieldCatalog>,
    options: TranslateOptions,
}

impl Translator {
    pub fn new(catalog: Arc<FieldCatalog>, options: TranslateOptions) -> Self {
        Self { catalog, options }
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    /// Compile `expr` into a filter tree. `None` and an empty conjunction are
    /// the empty predicate.
    pub fn compile(&self, doc_type: &str, expr: Option<&Expr>) -> Result<Filter> {
        self.catalog.describe(doc_type)?;
        let expr = match expr {
            Some(Expr::And { args }) if args.is_empty() => None,
            other => other,
        };
        match expr {
            None if !self.options.allow_empty => Err(FilterError::EmptyPredicate),
            None => Ok(Filter::always()),
            Some(expr) => PredicateCompiler::new(&self.catalog, doc_type).compile(expr),
        }
    }

    pub fn where_clause(&self, doc_type: &str, expr: Option<&Expr>) -> Result<CompiledCommand> {
        let filter = self.compile(doc_type, expr)?;
        let cmd = Emitter::new(&self.options).where_clause(&filter);
        debug!(doc_type, sql = %cmd.text, params = cmd.parameters.len(), "compiled where clause");
        Ok(cmd)
    }

    pub fn select(&self, doc_type: &str, expr: Option<&Expr>) -> Result<CompiledCommand> {
        let desc = self.catalog.describe(doc_type)?;
        let filter = self.compile(doc_type, expr)?;
        let cmd = Emitter::new(&self.options).select_documents(desc, &filter);
        debug!(doc_type, sql = %cmd.text, params = cmd.parameters.len(), "compiled select");
        Ok(cmd)
    }

    pub fn count(&self, doc_type: &str, expr: Option<&Expr>) -> Result<CompiledCommand> {
        let desc = self.catalog.describe(doc_type)?;
        let filter = self.compile(doc_type, expr)?;
        let cmd = Emitter::new(&self.options).count_documents(desc, &filter);
        debug!(doc_type, sql = %cmd.text, params = cmd.parameters.len(), "compiled count");
        Ok(cmd)
    }
}
