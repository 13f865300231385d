//! Error types for every layer of the pipeline.
//!
//! Each layer owns one `thiserror` enum and lower layers convert upward with
//! `#[from]`, so a failure keeps its original cause all the way to the
//! per-item boundary in [`crate::pipeline`] or to `main`.

use serde::Serialize;

/// Failure talking to the collection API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The API answered with a non-success status.
    #[error("collection API error {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response (timeout, refused connection, ...).
    #[error("network error: {message}")]
    Network { message: String },

    /// The request could not be built or sent in a way a retry would fix
    /// (invalid header value, redirect loop, ...).
    #[error("request error: {message}")]
    Request { message: String },

    /// A success response whose body was not JSON.
    #[error("could not decode response body: {0}")]
    Decode(String),

    /// Every attempt failed with a transient error.
    #[error("collection API failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl TransportError {
    /// Rate limiting, server-side failures and network errors are worth retrying.
    /// Every other status is a defect in the request itself.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Network { .. } => true,
            Self::Request { .. } | Self::Decode(_) | Self::RetriesExhausted { .. } => false,
        }
    }

    /// The raw error body (or message) kept for diagnostics.
    pub fn diagnostic_body(&self) -> String {
        match self {
            Self::Status { status, body } => format!("{{\"status\":{status},\"body\":{body:?}}}"),
            Self::Network { message } | Self::Request { message } => {
                format!("{{\"error\":{message:?}}}")
            }
            Self::Decode(msg) => msg.clone(),
            Self::RetriesExhausted { last, .. } => last.clone(),
        }
    }
}

/// One row of the table attached to [`ResolveError::NoFullMatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateDiagnostic {
    pub data_source_id: String,
    pub name: String,
    pub matched: usize,
    pub missing: Vec<String>,
}

/// Failure selecting the data source under a database.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("database {database_id} has no data sources")]
    NoDataSource { database_id: String },

    #[error("single data source {name} ({data_source_id}) is missing fields {missing:?}")]
    SchemaMismatch {
        data_source_id: String,
        name: String,
        missing: Vec<String>,
    },

    #[error(
        "no data source under database {database_id} carries all of {required:?}; candidates: {}",
        serde_json::to_string(candidates).unwrap_or_default()
    )]
    NoFullMatch {
        database_id: String,
        required: Vec<String>,
        candidates: Vec<CandidateDiagnostic>,
    },

    #[error("malformed API payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A logical field could not be bound to a field of the selected data source.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("field {name:?} not found in data source {data_source_id}")]
    Unresolved { name: String, data_source_id: String },

    #[error("data source {data_source_id} has no title field")]
    NoTitleField { data_source_id: String },

    #[error("field {name:?} is of kind {kind}, which cannot hold {wanted}")]
    KindMismatch {
        name: String,
        kind: String,
        wanted: &'static str,
    },
}

/// Failure of a record-level operation.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("malformed API payload: {0}")]
    Malformed(String),

    #[error("relation {field:?} of {record_id} would hold {total} links; one write accepts at most {limit}")]
    RelationLimit {
        record_id: String,
        field: String,
        total: usize,
        limit: usize,
    },
}

/// Failure producing a summary and terms for an article.
#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("LLM backend error: {0}")]
    Backend(String),

    #[error("LLM returned non-conforming JSON: {0}")]
    InvalidResponse(String),
}

/// Fatal startup problem; raised before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("could not read config file {path}: {message}")]
    File { path: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Anything that aborts a single article while the run continues.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("summarization failed: {0}")]
    Summarize(#[from] SummarizeError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}
