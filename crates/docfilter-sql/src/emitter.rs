use crate::filter::{Filter, Param, SqlExpr};
use crate::options::TranslateOptions;
use docfilter_core::util::{blake3_hex, quote_ident, quote_literal, sql_ident};
use docfilter_core::DocumentTypeDescriptor;
use serde::Serialize;

/// Query text plus the parameters its `$n` placeholders refer to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledCommand {
    pub text: String,
    pub parameters: Vec<Param>,
}

impl CompiledCommand {
    /// Stable digest of the command text. Commands that differ only in
    /// parameter values share a fingerprint.
    pub fn fingerprint(&self) -> String {
        blake3_hex(self.text.as_bytes())
    }
}

enum Fragment {
    Sql(String),
    Param(Param),
}

#[derive(Default)]
struct SqlBuilder {
    fragments: Vec<Fragment>,
}

impl SqlBuilder {
    fn sql(&mut self, s: impl AsRef<str>) {
        self.fragments.push(Fragment::Sql(s.as_ref().to_owned()));
    }

    fn param(&mut self, param: &Param) {
        self.fragments.push(Fragment::Param(param.clone()));
    }

    fn build(self) -> CompiledCommand {
        let mut text = String::new();
        let mut parameters = Vec::new();
        for fragment in self.fragments {
            match fragment {
                Fragment::Sql(s) => text.push_str(&s),
                Fragment::Param(p) => {
                    parameters.push(p);
                    text.push_str(&format!("${}", parameters.len()));
                }
            }
        }
        CompiledCommand { text, parameters }
    }
}

/// Renders [`Filter`] trees as PostgreSQL.
#[derive(Debug, Clone, Copy)]
pub struct Emitter<'a> {
    options: &'a TranslateOptions,
}

impl<'a> Emitter<'a> {
    pub fn new(options: &'a TranslateOptions) -> Self {
        Self { options }
    }

    pub fn where_clause(&self, filter: &Filter) -> CompiledCommand {
        let mut b = SqlBuilder::default();
        self.filter(&mut b, filter);
        b.build()
    }

    pub fn select_documents(&self, desc: &DocumentTypeDescriptor, filter: &Filter) -> CompiledCommand {
        self.statement(
            format!("select {}", self.data()),
            desc,
            filter,
        )
    }

    pub fn count_documents(&self, desc: &DocumentTypeDescriptor, filter: &Filter) -> CompiledCommand {
        self.statement("select count(*)".to_string(), desc, filter)
    }

    fn statement(&self, head: String, desc: &DocumentTypeDescriptor, filter: &Filter) -> CompiledCommand {
        let mut b = SqlBuilder::default();
        b.sql(format!(
            "{} from {} as {}",
            head,
            quote_ident(&desc.table),
            self.alias()
        ));
        if !filter.is_always() {
            b.sql(" where ");
            self.filter(&mut b, filter);
        }
        b.build()
    }

    fn alias(&self) -> String {
        sql_ident(&self.options.table_alias)
    }

    /// The jsonb body column, qualified by the table alias.
    fn data(&self) -> String {
        format!("{}.{}", self.alias(), sql_ident(&self.options.data_column))
    }

    fn filter(&self, b: &mut SqlBuilder, filter: &Filter) {
        match filter {
            Filter::And(children) => self.combinator(b, children, " AND ", "TRUE"),
            Filter::Or(children) => self.combinator(b, children, " OR ", "FALSE"),
            Filter::Not(inner) => {
                b.sql("NOT (");
                self.filter(b, inner);
                b.sql(")");
            }
            Filter::Compare { field, op, param } => {
                self.expr(b, &field.expr);
                b.sql(format!(" {} ", op));
                b.param(param);
            }
            Filter::CompareFields { left, op, right } => {
                self.expr(b, &left.expr);
                b.sql(format!(" {} ", op));
                self.expr(b, &right.expr);
            }
            Filter::In {
                field,
                params,
                negated,
            } => {
                self.expr(b, &field.expr);
                b.sql(if *negated { " NOT IN (" } else { " IN (" });
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        b.sql(", ");
                    }
                    b.param(p);
                }
                b.sql(")");
            }
            Filter::Between { field, low, high } => {
                self.expr(b, &field.expr);
                b.sql(" BETWEEN ");
                b.param(low);
                b.sql(" AND ");
                b.param(high);
            }
            Filter::IsNull { field, negated } => {
                self.expr(b, &field.expr);
                b.sql(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Filter::Like {
                field,
                pattern,
                case_insensitive,
            } => {
                self.expr(b, &field.expr);
                b.sql(if *case_insensitive { " ILIKE " } else { " LIKE " });
                b.param(pattern);
            }
        }
    }

    fn combinator(&self, b: &mut SqlBuilder, children: &[Filter], joiner: &str, identity: &str) {
        if children.is_empty() {
            b.sql(identity);
            return;
        }
        b.sql("(");
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                b.sql(joiner);
            }
            self.filter(b, child);
        }
        b.sql(")");
    }

    fn expr(&self, b: &mut SqlBuilder, expr: &SqlExpr) {
        match expr {
            SqlExpr::JsonText { segments } => {
                let mut s = self.data();
                for (i, seg) in segments.iter().enumerate() {
                    let arrow = if i + 1 == segments.len() { "->>" } else { "->" };
                    s.push_str(&format!(" {} {}", arrow, quote_literal(seg)));
                }
                b.sql(s);
            }
            SqlExpr::Column(name) => {
                b.sql(format!("{}.{}", self.alias(), quote_ident(name)));
            }
            SqlExpr::Cast { inner, to } => {
                b.sql("CAST(");
                self.expr(b, inner);
                b.sql(format!(" AS {})", to));
            }
            SqlExpr::AtUtc(inner) => {
                b.sql("(");
                self.expr(b, inner);
                b.sql(" AT TIME ZONE 'UTC')");
            }
        }
    }
}
