use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docfilter_core::{Expr, FieldCatalog};
use docfilter_sql::{TranslateOptions, Translator};
use docfilter_storage::{InMemoryStore, Storage};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "docfilter")]
#[command(about = "Translate document predicates into parameterized SQL", long_about = None)]
struct Cli {
    /// Field catalog as JSON (a list of document type descriptors).
    #[arg(long, global = true, default_value = "catalog.json")]
    catalog: String,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Where,
    Select,
    Count,
}

#[derive(Subcommand)]
enum Cmd {
    /// Compile a predicate and print the command text with its parameters.
    Compile {
        #[arg(long)]
        doc_type: String,
        /// Predicate as JSON, or `@path` to read it from a file. Omit for the empty predicate.
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, value_enum, default_value_t = Mode::Select)]
        mode: Mode,
    },
    /// Print the storage strategy of every field of a document type.
    Describe {
        #[arg(long)]
        doc_type: String,
    },
    /// Load newline-delimited documents and print the ones matching a predicate.
    Query {
        #[arg(long)]
        doc_type: String,
        #[arg(long)]
        filter: Option<String>,
        /// File with one JSON document per line.
        #[arg(long)]
        docs: String,
    },
}

fn read_arg(raw: &str) -> Result<String> {
    match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path)),
        None => Ok(raw.to_string()),
    }
}

fn parse_filter(raw: Option<&str>) -> Result<Option<Expr>> {
    raw.map(|r| {
        let text = read_arg(r)?;
        serde_json::from_str(&text).context("parsing filter")
    })
    .transpose()
}

fn load_catalog(path: &str) -> Result<Arc<FieldCatalog>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    Ok(Arc::new(FieldCatalog::from_json(&raw)?))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = load_catalog(&cli.catalog)?;
    let options = TranslateOptions::from_env();
    match cli.cmd {
        Cmd::Compile {
            doc_type,
            filter,
            mode,
        } => {
            let expr = parse_filter(filter.as_deref())?;
            let translator = Translator::new(catalog, options);
            let cmd = match mode {
                Mode::Where => translator.where_clause(&doc_type, expr.as_ref())?,
                Mode::Select => translator.select(&doc_type, expr.as_ref())?,
                Mode::Count => translator.count(&doc_type, expr.as_ref())?,
            };
            let out = serde_json::json!({
                "text": cmd.text,
                "parameters": cmd.parameters,
                "fingerprint": cmd.fingerprint(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Cmd::Describe { doc_type } => {
            let desc = catalog.describe(&doc_type)?;
            println!("{}", serde_json::to_string_pretty(desc)?);
        }
        Cmd::Query {
            doc_type,
            filter,
            docs,
        } => {
            let expr = parse_filter(filter.as_deref())?;
            let store = InMemoryStore::with_options(catalog, options);
            let raw = std::fs::read_to_string(&docs).with_context(|| format!("reading {}", docs))?;
            let mut loaded = 0usize;
            for line in raw.lines().filter(|l| !l.trim().is_empty()) {
                store.put(&doc_type, serde_json::from_str(line)?)?;
                loaded += 1;
            }
            let matched = store.query(&doc_type, expr.as_ref())?;
            info!(loaded, matched = matched.len(), "query finished");
            for doc in matched {
                println!("{}", serde_json::to_string(&doc.body)?);
            }
        }
    }
    Ok(())
}
