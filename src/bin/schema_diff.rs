//! Offline schema comparison
//!
//! Compares a desired schema document with a dumped `GET /<index>` response
//! and prints every difference, without talking to a cluster.
//!
//! Usage: schema-diff <desired.json> <observed.json> [index] [--json]

use anyhow::{Context, Result, bail};
use std::path::Path;

use schema_sync_rs::models::{IndexSchema, MetadataView};
use schema_sync_rs::schema::diff;

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let content = std::fs::read_to_string(Path::new(path)).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {path}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let as_json = match args.iter().position(|arg| arg == "--json") {
        Some(position) => {
            args.remove(position);
            true
        }
        None => false,
    };
    let (desired_path, observed_path, index) = match args.as_slice() {
        [desired, observed] => (desired, observed, None),
        [desired, observed, index] => (desired, observed, Some(index.as_str())),
        _ => bail!("Usage: schema-diff <desired.json> <observed.json> [index] [--json]"),
    };

    let desired: IndexSchema = read_json(desired_path)?;
    let view: MetadataView = read_json(observed_path)?;

    let names: Vec<&str> = view.index_names().collect();
    let name = match (index, names.as_slice()) {
        (Some(index), _) => index,
        (None, [only]) => *only,
        (None, []) => bail!("{observed_path} does not contain any index"),
        (None, _) => bail!("{observed_path} contains {} indexes, name one of: {}", names.len(), names.join(", ")),
    };
    let observed = view
        .get(name)
        .with_context(|| format!("Index '{name}' not found in {observed_path}"))?;
    tracing::debug!("Comparing {desired_path} with '{name}'");

    match diff(name, &desired, &observed.schema) {
        None => {
            println!("No differences");
            Ok(())
        }
        Some(report) => {
            if as_json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                println!("{report}");
            }
            std::process::exit(1);
        }
    }
}
