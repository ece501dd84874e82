use std::time::Duration;
use thiserror::Error;

use crate::es::IndexStatus;
use crate::failure::{Failure, FailureReport};

/// Transport-level failure of one store call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Elasticsearch error: {0}")]
    Elasticsearch(#[from] elasticsearch::Error),

    #[error("Request failed (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index '{index}' did not reach status '{status}' within {timeout:?}")]
    StatusTimeout {
        index: String,
        status: IndexStatus,
        timeout: Duration,
    },

    #[error("Request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema of index '{index}' is invalid.\n{report}")]
    Validation { index: String, report: FailureReport },

    #[error("Update of index '{index}' is blocked ({} difference(s) applied).\n{report}", applied.len())]
    UpdateBlocked {
        index: String,
        report: FailureReport,
        applied: Vec<Failure>,
    },

    #[error("Index '{index}': failed to {action}: {source}")]
    Transport {
        index: String,
        action: String,
        #[source]
        source: StoreError,
    },

    #[error("{} of {total} schema operations failed", failures.len())]
    Batch { total: usize, failures: Vec<SchemaError> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema task failed: {0}")]
    Task(String),
}

impl SchemaError {
    /// The structured report carried by this error, merged across a batch.
    pub fn report(&self) -> Option<FailureReport> {
        match self {
            Self::Validation { report, .. } | Self::UpdateBlocked { report, .. } => Some(report.clone()),
            Self::Batch { failures, .. } => failures
                .iter()
                .filter_map(SchemaError::report)
                .reduce(|mut merged, report| {
                    merged.merge(report);
                    merged
                }),
            _ => None,
        }
    }
}
