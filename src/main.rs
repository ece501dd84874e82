use anyhow::Context;
use std::sync::Arc;

use schema_sync_rs::config::AppConfig;
use schema_sync_rs::es::ElasticsearchStore;
use schema_sync_rs::schema::{SchemaManager, load_desired_index};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("schema_sync_rs=info".parse()?),
        )
        .init();

    tracing::info!("Starting schema-sync...");

    // Load configuration (env vars override TOML)
    let config = AppConfig::load()?;
    tracing::info!("Elasticsearch URL: {}", config.elasticsearch.url);
    tracing::info!(
        "Operation: {} (layout '{}', {} index(es))",
        config.schema.operation,
        config.schema.layout,
        config.indexes.len()
    );

    let store = ElasticsearchStore::from_config(&config.elasticsearch)?;
    tracing::info!("Elasticsearch client initialized");

    let manager = SchemaManager::from_config(Arc::new(store), &config.schema)?;

    let mut indexes = Vec::with_capacity(config.indexes.len());
    for index in &config.indexes {
        let desired =
            load_desired_index(index).with_context(|| format!("Failed to load schema of '{}'", index.name))?;
        indexes.push(desired);
    }

    let outcome = manager
        .execute_batch(config.schema.operation, indexes, config.schema.submission)
        .await;

    for done in &outcome.succeeded {
        tracing::info!(
            "'{}': {} ({} action(s), {} difference(s) applied)",
            done.index,
            done.operation,
            done.actions.len(),
            done.applied.len()
        );
    }

    if let Err(e) = outcome.into_result() {
        if let Some(report) = e.report() {
            eprintln!("{report}");
        }
        anyhow::bail!(e);
    }

    tracing::info!("All indexes are up to date");
    Ok(())
}
