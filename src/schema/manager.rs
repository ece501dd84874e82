//! Runs schema operations against a [`SchemaStore`].
//!
//! One operation on one index is strictly sequential: probe, fetch, plan,
//! execute. Operations on different indexes are independent and a batch runs
//! them concurrently up to the configured bound.

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::dialect::ElasticsearchDialect;
use super::planner::{ActionPlanner, PlanFailure, SchemaAction, SchemaOperation, SchemaState};
use crate::config::SchemaConfig;
use crate::error::{SchemaError, StoreError};
use crate::es::{IndexStatus, SchemaStore};
use crate::failure::Failure;
use crate::models::{DesiredIndex, MetadataView};

/// How [`SchemaManager::submit`] runs an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionMode {
    /// The operation runs in the caller's task when the handle is awaited.
    Blocking,
    /// The operation is spawned on the runtime right away.
    NonBlocking,
}

impl FromStr for SubmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "blocking" => Ok(Self::Blocking),
            "non-blocking" => Ok(Self::NonBlocking),
            other => Err(format!("unknown submission mode '{other}'")),
        }
    }
}

/// Result of a successful operation on one index.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub index: String,
    pub operation: SchemaOperation,
    /// State the index was probed in.
    pub state: SchemaState,
    /// Descriptions of the actions executed, in order.
    pub actions: Vec<String>,
    /// Differences an update resolved.
    pub applied: Vec<Failure>,
}

type OperationResult = Result<OperationOutcome, SchemaError>;

/// Handle of a submitted operation.
pub enum SchemaTask {
    Inline(BoxFuture<'static, OperationResult>),
    Spawned(JoinHandle<OperationResult>),
}

impl Future for SchemaTask {
    type Output = OperationResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            Self::Inline(future) => future.as_mut().poll(cx),
            Self::Spawned(handle) => Pin::new(handle)
                .poll(cx)
                .map(|joined| joined.unwrap_or_else(|e| Err(SchemaError::Task(e.to_string())))),
        }
    }
}

/// Outcome of running one operation over many indexes.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<OperationOutcome>,
    pub failed: Vec<(String, SchemaError)>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Every outcome, or one error carrying every per-index failure.
    pub fn into_result(self) -> Result<Vec<OperationOutcome>, SchemaError> {
        if self.failed.is_empty() {
            return Ok(self.succeeded);
        }
        Err(SchemaError::Batch {
            total: self.total(),
            failures: self.failed.into_iter().map(|(_, error)| error).collect(),
        })
    }
}

#[derive(Clone)]
pub struct SchemaManager {
    store: Arc<dyn SchemaStore>,
    planner: ActionPlanner,
    required_status: IndexStatus,
    status_timeout: Duration,
    concurrency: usize,
}

impl SchemaManager {
    pub fn new(store: Arc<dyn SchemaStore>, planner: ActionPlanner) -> Self {
        Self {
            store,
            planner,
            required_status: IndexStatus::Yellow,
            status_timeout: Duration::from_secs(10),
            concurrency: 4,
        }
    }

    pub fn from_config(store: Arc<dyn SchemaStore>, config: &SchemaConfig) -> Result<Self, SchemaError> {
        let registry = config.layout_registry();
        let layout = registry.get(&config.layout).ok_or_else(|| {
            SchemaError::Config(format!(
                "Unknown layout '{}'. Available: {}",
                config.layout,
                registry.names().join(", ")
            ))
        })?;
        let dialect = Arc::new(ElasticsearchDialect::from_config(&config.dialect));

        Ok(Self::new(store, ActionPlanner::new(layout, dialect))
            .with_required_status(config.required_status)
            .with_status_timeout(Duration::from_millis(config.status_timeout_ms))
            .with_concurrency(config.concurrency))
    }

    pub fn with_required_status(mut self, status: IndexStatus) -> Self {
        self.required_status = status;
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn planner(&self) -> &ActionPlanner {
        &self.planner
    }

    pub async fn create_if_missing(&self, desired: &DesiredIndex) -> OperationResult {
        self.run(SchemaOperation::CreateIfMissing, desired).await
    }

    pub async fn drop_and_create(&self, desired: &DesiredIndex) -> OperationResult {
        self.run(SchemaOperation::DropAndCreate, desired).await
    }

    pub async fn drop_if_existing(&self, desired: &DesiredIndex) -> OperationResult {
        self.run(SchemaOperation::DropIfExisting, desired).await
    }

    pub async fn create_or_validate(&self, desired: &DesiredIndex) -> OperationResult {
        self.run(SchemaOperation::CreateOrValidate, desired).await
    }

    pub async fn create_or_update(&self, desired: &DesiredIndex) -> OperationResult {
        self.run(SchemaOperation::CreateOrUpdate, desired).await
    }

    pub async fn validate(&self, desired: &DesiredIndex) -> OperationResult {
        self.run(SchemaOperation::Validate, desired).await
    }

    /// Runs `operation` on one index and returns once it has finished.
    pub async fn run(&self, operation: SchemaOperation, desired: &DesiredIndex) -> OperationResult {
        let index = desired.name.as_str();
        let targets = self.planner.names(index).probe_targets();
        tracing::debug!("[{index}] {operation}: probing {}", targets.join(", "));

        let exists = self
            .store
            .exists(&targets)
            .await
            .map_err(|source| transport(index, "probe existence", source))?;

        let plan = if !operation.needs_schema() {
            self.planner.plan_existence(operation, desired, exists)
        } else {
            let view = if exists {
                self.store
                    .fetch_schema(&targets)
                    .await
                    .map_err(|source| transport(index, "fetch schema", source))?
            } else {
                MetadataView::new()
            };
            self.planner.plan(operation, desired, &view)
        };
        tracing::info!(
            "[{index}] {operation}: index is {:?}, {} action(s) planned",
            plan.state,
            plan.actions.len()
        );

        let mut executed = Vec::with_capacity(plan.actions.len());
        // Index closed by this run and not reopened yet.
        let mut closed: Option<&str> = None;
        for action in &plan.actions {
            if let SchemaAction::OpenIndex { .. } = action {
                closed = None;
            }
            if let Err(source) = self.execute(action).await {
                if let Some(closed) = closed {
                    self.reopen(index, closed).await;
                }
                return Err(transport(index, &action.to_string(), source));
            }
            if let SchemaAction::CloseIndex { index: target } = action {
                closed = Some(target);
            }
            tracing::debug!("[{index}] {action}");
            executed.push(action.to_string());
        }

        match plan.failure {
            Some(PlanFailure::Invalid(report)) => {
                tracing::warn!("[{index}] {operation} failed validation");
                Err(SchemaError::Validation {
                    index: index.to_owned(),
                    report,
                })
            }
            Some(PlanFailure::Blocked(report)) => {
                tracing::warn!(
                    "[{index}] {operation} blocked, {} difference(s) applied",
                    plan.applied.len()
                );
                Err(SchemaError::UpdateBlocked {
                    index: index.to_owned(),
                    report,
                    applied: plan.applied,
                })
            }
            None => {
                tracing::info!("[{index}] {operation} done");
                Ok(OperationOutcome {
                    index: index.to_owned(),
                    operation,
                    state: plan.state,
                    actions: executed,
                    applied: plan.applied,
                })
            }
        }
    }

    /// Starts `operation` according to `mode` and returns a handle to await.
    pub fn submit(&self, operation: SchemaOperation, desired: DesiredIndex, mode: SubmissionMode) -> SchemaTask {
        let manager = self.clone();
        let future = async move { manager.run(operation, &desired).await };
        match mode {
            SubmissionMode::Blocking => SchemaTask::Inline(future.boxed()),
            SubmissionMode::NonBlocking => SchemaTask::Spawned(tokio::spawn(future)),
        }
    }

    /// Runs `operation` on every index. A failing index never stops its siblings.
    pub async fn execute_batch(
        &self,
        operation: SchemaOperation,
        indexes: Vec<DesiredIndex>,
        mode: SubmissionMode,
    ) -> BatchOutcome {
        tracing::info!(
            "Running {operation} on {} index(es), {} at a time",
            indexes.len(),
            self.concurrency
        );
        let results: Vec<(String, OperationResult)> = futures::stream::iter(indexes)
            .map(|desired| {
                let name = desired.name.clone();
                self.submit(operation, desired, mode).map(move |result| (name, result))
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for (name, result) in results {
            match result {
                Ok(done) => outcome.succeeded.push(done),
                Err(e) => {
                    tracing::error!("[{name}] {e}");
                    outcome.failed.push((name, e));
                }
            }
        }
        outcome.succeeded.sort_by(|a, b| a.index.cmp(&b.index));
        outcome.failed.sort_by(|a, b| a.0.cmp(&b.0));
        outcome
    }

    /// Opens `closed` again after a later action of the same run failed.
    async fn reopen(&self, index: &str, closed: &str) {
        match self.store.open_index(closed).await {
            Ok(()) => tracing::warn!("[{index}] reopened '{closed}' after a failed update"),
            Err(e) => tracing::error!("[{index}] '{closed}' is left closed: {e}"),
        }
    }

    async fn execute(&self, action: &SchemaAction) -> Result<(), StoreError> {
        match action {
            SchemaAction::CreateIndex { index, schema, aliases } => {
                self.store.create_index(index, schema, aliases).await
            }
            SchemaAction::DropIndex { index } => self.store.drop_index(index).await,
            SchemaAction::CloseIndex { index } => self.store.close_index(index).await,
            SchemaAction::UpdateSettings { index, settings } => self.store.update_settings(index, settings).await,
            SchemaAction::OpenIndex { index } => self.store.open_index(index).await,
            SchemaAction::UpdateMapping { index, mapping } => self.store.update_mapping(index, mapping).await,
            SchemaAction::RemoveAlias { index, alias } => self.store.remove_alias(index, alias).await,
            SchemaAction::PutAlias {
                index,
                alias,
                definition,
            } => self.store.put_alias(index, alias, definition).await,
            SchemaAction::WaitForStatus { index } => {
                self.store
                    .wait_for_status(index, self.required_status, self.status_timeout)
                    .await
            }
        }
    }
}

fn transport(index: &str, action: &str, source: StoreError) -> SchemaError {
    SchemaError::Transport {
        index: index.to_owned(),
        action: action.to_owned(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::es::{MemoryStore, StoreOperation};
    use crate::schema::alias::SimpleLayout;
    use serde_json::json;

    fn manager(store: Arc<MemoryStore>) -> SchemaManager {
        let planner = ActionPlanner::new(Arc::new(SimpleLayout), Arc::new(ElasticsearchDialect::default()));
        SchemaManager::new(store, planner)
    }

    fn desired(name: &str) -> DesiredIndex {
        DesiredIndex::new(
            name,
            serde_json::from_value(json!({
                "mappings": { "properties": { "title": { "type": "text" } } },
                "settings": { "number_of_shards": 1 }
            }))
            .unwrap(),
        )
    }

    #[test]
    fn test_submission_mode_parses() {
        assert_eq!("blocking".parse(), Ok(SubmissionMode::Blocking));
        assert_eq!("non_blocking".parse(), Ok(SubmissionMode::NonBlocking));
        assert!("eventually".parse::<SubmissionMode>().is_err());
    }

    #[tokio::test]
    async fn test_create_if_missing_only_probes_existence() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone());

        let created = manager.create_if_missing(&desired("books")).await.unwrap();
        assert_eq!(created.state, SchemaState::Missing);
        assert_eq!(store.index_names(), vec!["books-000001"]);

        store.clear_calls();
        let again = manager.create_if_missing(&desired("books")).await.unwrap();
        assert_eq!(again.state, SchemaState::Exists);
        assert!(again.actions.is_empty());
        let operations: Vec<StoreOperation> = store.calls().into_iter().map(|call| call.operation).collect();
        assert_eq!(operations, vec![StoreOperation::Exists]);
    }

    #[tokio::test]
    async fn test_transport_failure_names_index_and_action() {
        let store = Arc::new(MemoryStore::new());
        store.fail_on(StoreOperation::CreateIndex, "disk full");

        let err = manager(store).create_or_validate(&desired("books")).await.unwrap_err();
        match err {
            SchemaError::Transport { index, action, source } => {
                assert_eq!(index, "books");
                assert_eq!(action, "create index 'books-000001'");
                assert!(matches!(source, StoreError::Rejected(reason) if reason == "disk full"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn test_status_timeout_fails_operation() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone()).with_required_status(IndexStatus::Green);
        manager.create_if_missing(&desired("books")).await.unwrap();
        store.set_status("books-000001", IndexStatus::Yellow);

        let err = manager.validate(&desired("books")).await.unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Transport {
                source: StoreError::StatusTimeout { status: IndexStatus::Green, .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_submit_in_both_modes() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone());

        let blocking = manager.submit(SchemaOperation::CreateOrValidate, desired("books"), SubmissionMode::Blocking);
        let spawned = manager.submit(
            SchemaOperation::CreateOrValidate,
            desired("authors"),
            SubmissionMode::NonBlocking,
        );
        assert_eq!(blocking.await.unwrap().index, "books");
        assert_eq!(spawned.await.unwrap().index, "authors");
        assert_eq!(store.index_names(), vec!["authors-000001", "books-000001"]);
    }

    #[tokio::test]
    async fn test_unknown_layout_is_a_config_error() {
        let config = SchemaConfig {
            layout: "rollover".into(),
            ..SchemaConfig::default()
        };
        let err = SchemaManager::from_config(Arc::new(MemoryStore::new()), &config)
            .err()
            .unwrap();
        assert!(matches!(err, SchemaError::Config(message) if message.contains("no-alias, simple")));
    }
}
