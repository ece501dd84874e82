use async_trait::async_trait;
use elasticsearch::cluster::ClusterHealthParts;
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::{
    IndicesCloseParts, IndicesCreateParts, IndicesDeleteAliasParts, IndicesDeleteParts,
    IndicesExistsParts, IndicesGetParts, IndicesOpenParts, IndicesPutAliasParts,
    IndicesPutMappingParts, IndicesPutSettingsParts,
};
use elasticsearch::params::WaitForStatus;
use elasticsearch::Elasticsearch;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::EsConfig;
use crate::error::StoreError;
use crate::es::mapping::{alias_body, create_index_body, mapping_body, settings_body};
use crate::es::store::{IndexStatus, SchemaStore};
use crate::models::{AliasDefinition, IndexSchema, IndexSettings, MetadataView, RootMapping};

pub fn create_client(config: &EsConfig) -> anyhow::Result<Elasticsearch> {
    let url = Url::parse(&config.url)?;
    let pool = SingleNodeConnectionPool::new(url);
    let transport = TransportBuilder::new(pool).disable_proxy().build()?;
    Ok(Elasticsearch::new(transport))
}

/// [`SchemaStore`] backed by an Elasticsearch cluster.
///
/// Every name is probed with its own request so that aliases and concrete
/// indexes can be mixed freely and a missing name is simply a 404.
#[derive(Clone)]
pub struct ElasticsearchStore {
    client: Arc<Elasticsearch>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    timed_out: bool,
}

impl ElasticsearchStore {
    pub fn new(client: Arc<Elasticsearch>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &EsConfig) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(create_client(config)?)))
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status_code();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

fn wait_for(status: IndexStatus) -> WaitForStatus {
    match status {
        IndexStatus::Green => WaitForStatus::Green,
        IndexStatus::Yellow => WaitForStatus::Yellow,
        IndexStatus::Red => WaitForStatus::Red,
    }
}

#[async_trait]
impl SchemaStore for ElasticsearchStore {
    async fn exists(&self, names: &[String]) -> Result<bool, StoreError> {
        for name in names {
            let response = self
                .client
                .indices()
                .exists(IndicesExistsParts::Index(&[name.as_str()]))
                .send()
                .await?;
            match response.status_code().as_u16() {
                404 => continue,
                _ => {
                    ensure_success(response).await?;
                    tracing::debug!("'{name}' exists");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn fetch_schema(&self, names: &[String]) -> Result<MetadataView, StoreError> {
        let mut view = MetadataView::new();
        for name in names {
            let response = self
                .client
                .indices()
                .get(IndicesGetParts::Index(&[name.as_str()]))
                .send()
                .await?;
            if response.status_code().as_u16() == 404 {
                tracing::debug!("'{name}' does not resolve to any index");
                continue;
            }
            let resolved: MetadataView = ensure_success(response).await?.json().await?;
            view.extend(resolved);
        }
        Ok(view)
    }

    async fn create_index(
        &self,
        index: &str,
        schema: &IndexSchema,
        aliases: &BTreeMap<String, AliasDefinition>,
    ) -> Result<(), StoreError> {
        let body = create_index_body(schema, aliases)?;
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body)
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::info!("Created index '{index}'");
        Ok(())
    }

    async fn update_settings(&self, index: &str, settings: &IndexSettings) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .put_settings(IndicesPutSettingsParts::Index(&[index]))
            .body(settings_body(settings)?)
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::info!("Updated settings of '{index}'");
        Ok(())
    }

    async fn update_mapping(&self, index: &str, mapping: &RootMapping) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .put_mapping(IndicesPutMappingParts::Index(&[index]))
            .body(mapping_body(mapping)?)
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::info!("Updated mapping of '{index}'");
        Ok(())
    }

    async fn close_index(&self, index: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .close(IndicesCloseParts::Index(&[index]))
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::debug!("Closed '{index}'");
        Ok(())
    }

    async fn open_index(&self, index: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .open(IndicesOpenParts::Index(&[index]))
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::debug!("Opened '{index}'");
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str, definition: &AliasDefinition) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .put_alias(IndicesPutAliasParts::IndexName(&[index], alias))
            .body(alias_body(definition)?)
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::info!("Put alias '{alias}' on '{index}'");
        Ok(())
    }

    async fn remove_alias(&self, index: &str, alias: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .delete_alias(IndicesDeleteAliasParts::IndexName(&[index], &[alias]))
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::info!("Removed alias '{alias}' from '{index}'");
        Ok(())
    }

    async fn drop_index(&self, index: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::info!("Dropped index '{index}'");
        Ok(())
    }

    async fn wait_for_status(&self, index: &str, status: IndexStatus, timeout: Duration) -> Result<(), StoreError> {
        let wait_timeout = format!("{}ms", timeout.as_millis());
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::Index(&[index]))
            .wait_for_status(wait_for(status))
            .timeout(&wait_timeout)
            .send()
            .await?;

        let timed_out = || StoreError::StatusTimeout {
            index: index.to_owned(),
            status,
            timeout,
        };
        // The cluster answers 408 when the wait times out.
        if response.status_code().as_u16() == 408 {
            return Err(timed_out());
        }
        let health: HealthResponse = ensure_success(response).await?.json().await?;
        if health.timed_out {
            return Err(timed_out());
        }
        tracing::debug!("'{index}' reached status '{status}'");
        Ok(())
    }
}
