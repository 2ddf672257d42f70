//! `ect list`

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use glob::{MatchOptions, Pattern};
use serde::Serialize;

use super::output::Output;
use crate::plugin::PluginLoader;
use crate::runtime;
use crate::storage::Config;

/// What `list` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ListKind {
    /// Registered operations
    #[default]
    #[value(alias = "operation", alias = "operations")]
    Op,

    /// Discovered plugin executables
    #[value(alias = "plugin", alias = "plugins")]
    Pi,

    /// Configured data sources
    #[value(alias = "data-source", alias = "data-sources")]
    Ds,
}

impl ListKind {
    fn noun(&self) -> &'static str {
        match self {
            ListKind::Op => "operation",
            ListKind::Pi => "plugin",
            ListKind::Ds => "data source",
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Kind of items to list
    #[arg(value_enum, default_value_t = ListKind::Op)]
    pub kind: ListKind,

    /// Only show names matching this glob (case-insensitive)
    #[arg(long, short = 'p')]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize)]
struct Entry {
    name: String,
    detail: String,
}

pub fn run(args: ListArgs, output: &Output) -> Result<()> {
    let pattern = args
        .pattern
        .as_deref()
        .map(Pattern::new)
        .transpose()
        .with_context(|| format!("invalid pattern '{}'", args.pattern.as_deref().unwrap_or("")))?;

    let entries = match args.kind {
        ListKind::Op => operations()?,
        ListKind::Pi => plugins(output)?,
        ListKind::Ds => data_sources()?,
    };

    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let entries: Vec<Entry> = entries
        .into_iter()
        .filter(|e| pattern.as_ref().map_or(true, |p| p.matches_with(&e.name, options)))
        .collect();

    output.verbose_ctx(
        "list",
        &format!("{} {}(s) after filtering with {:?}", entries.len(), args.kind.noun(), args.pattern),
    );

    if output.is_json() {
        output.data(&serde_json::json!({
            "kind": args.kind.noun(),
            "count": entries.len(),
            "items": entries,
        }));
    } else {
        let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
        for entry in &entries {
            if entry.detail.is_empty() {
                println!("{}", entry.name);
            } else {
                println!("{:<width$}  {}", entry.name, entry.detail, width = width);
            }
        }
        println!("{}", found_line(entries.len(), args.kind.noun()));
    }

    Ok(())
}

fn found_line(count: usize, noun: &str) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("{} {}{} found", count, noun, plural)
}

fn operations() -> Result<Vec<Entry>> {
    let runtime = runtime::global()?;
    Ok(runtime
        .operations
        .iter()
        .map(|op| Entry {
            name: op.qualified_name.clone(),
            detail: op.description.clone(),
        })
        .collect())
}

fn plugins(output: &Output) -> Result<Vec<Entry>> {
    let config = Config::load()?;
    let mut loader = PluginLoader::new();
    for dir in config.plugin_dirs() {
        output.verbose_ctx("list", &format!("Plugin directory: {}", dir.display()));
        loader.add_plugin_dir(dir);
    }
    loader.discover();

    Ok(loader
        .list()
        .into_iter()
        .map(|p| Entry {
            name: p.name.clone(),
            detail: format!("{} ({})", p.path.display(), p.source.as_str()),
        })
        .collect())
}

fn data_sources() -> Result<Vec<Entry>> {
    let config = Config::load()?;
    Ok(config
        .settings
        .data_sources
        .iter()
        .map(|ds| Entry {
            name: ds.name.clone(),
            detail: ds
                .description
                .clone()
                .unwrap_or_else(|| ds.path.display().to_string()),
        })
        .collect())
}
