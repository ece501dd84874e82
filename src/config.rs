use anyhow::bail;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::es::IndexStatus;
use crate::schema::{CustomLayout, LayoutRegistry, SchemaOperation, SubmissionMode};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub elasticsearch: EsConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EsConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub operation: SchemaOperation,
    /// Name of a registered layout strategy: `simple`, `no-alias` or `custom`.
    pub layout: String,
    pub custom_layout: Option<CustomLayoutConfig>,
    pub required_status: IndexStatus,
    pub status_timeout_ms: u64,
    /// Upper bound on indexes reconciled at the same time.
    pub concurrency: usize,
    pub submission: SubmissionMode,
    pub dialect: DialectConfig,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            operation: SchemaOperation::CreateOrValidate,
            layout: "simple".into(),
            custom_layout: None,
            required_status: IndexStatus::Yellow,
            status_timeout_ms: 10_000,
            concurrency: 4,
            submission: SubmissionMode::NonBlocking,
            dialect: DialectConfig::default(),
        }
    }
}

impl SchemaConfig {
    /// The built-in layouts, plus `custom` when its patterns are configured.
    pub fn layout_registry(&self) -> LayoutRegistry {
        let mut registry = LayoutRegistry::new();
        if let Some(custom) = &self.custom_layout {
            registry.register(
                "custom",
                CustomLayout {
                    primary: custom.primary.clone(),
                    write_alias: custom.write_alias.clone(),
                    read_alias: custom.read_alias.clone(),
                },
            );
        }
        registry
    }
}

/// Patterns for the `custom` layout. `{name}` is replaced by the index name.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomLayoutConfig {
    pub primary: String,
    #[serde(default)]
    pub write_alias: String,
    #[serde(default)]
    pub read_alias: String,
}

/// Which differences an update may apply. Setting keys may carry the `index.` prefix.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    pub immutable_settings: Vec<String>,
    pub dynamic_settings: Vec<String>,
    pub mergeable_attributes: Vec<String>,
}

impl Default for DialectConfig {
    fn default() -> Self {
        let owned = |keys: &[&str]| keys.iter().map(|key| key.to_string()).collect();
        Self {
            immutable_settings: owned(&["number_of_shards", "number_of_routing_shards", "routing_partition_size"]),
            dynamic_settings: owned(&[
                "number_of_replicas",
                "max_result_window",
                "refresh_interval",
                "auto_expand_replicas",
                "max_inner_result_window",
            ]),
            mergeable_attributes: owned(&["search_analyzer", "ignore_above", "fields"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    /// `{"mappings": ..., "settings": ...}` document with the computed schema.
    pub schema_file: PathBuf,
    /// Custom mapping fragment merged over the computed mapping.
    pub mapping_file: Option<PathBuf>,
    /// Custom settings fragment merged over the computed settings.
    pub settings_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        // .env is optional
        let _ = dotenvy::dotenv();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<AppConfig>(&content)?
        } else {
            AppConfig::defaults()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(url) = std::env::var("ELASTICSEARCH_URL") {
            self.elasticsearch.url = url;
        }
        if let Ok(val) = std::env::var("SCHEMA_OPERATION") {
            self.schema.operation = val.parse().map_err(anyhow::Error::msg)?;
        }
        if let Ok(val) = std::env::var("SCHEMA_LAYOUT") {
            self.schema.layout = val;
        }
        if let Ok(val) = std::env::var("SCHEMA_REQUIRED_STATUS") {
            self.schema.required_status = val.parse().map_err(anyhow::Error::msg)?;
        }
        if let Ok(val) = std::env::var("SCHEMA_STATUS_TIMEOUT_MS") {
            self.schema.status_timeout_ms = val.parse()?;
        }
        if let Ok(val) = std::env::var("SCHEMA_CONCURRENCY") {
            self.schema.concurrency = val.parse()?;
        }
        if let Ok(val) = std::env::var("SCHEMA_SUBMISSION") {
            self.schema.submission = val.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.indexes.is_empty() {
            bail!("No index configured. Add at least one [[indexes]] entry to config.toml");
        }
        if self.schema.concurrency == 0 {
            bail!("schema.concurrency must be at least 1");
        }
        if self.schema.layout == "custom" && self.schema.custom_layout.is_none() {
            bail!("schema.layout is 'custom' but no [schema.custom_layout] is configured");
        }
        Ok(())
    }

    fn defaults() -> Self {
        Self {
            elasticsearch: EsConfig {
                url: "http://localhost:9200".into(),
            },
            schema: SchemaConfig::default(),
            indexes: Vec::new(),
        }
    }
}
