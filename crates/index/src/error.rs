use thiserror::Error;

/// FTS-specific failure codes, distinguished per spec §4.6: an index never
/// initialized is a different condition from a syntactically bad query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtsErrorCode {
    TableNotFound,
    QueryError,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code:?}: {message}")]
pub struct FtsQueryError {
    pub code: FtsErrorCode,
    pub message: String,
}

impl FtsQueryError {
    pub fn table_not_found(predicate: &str) -> Self {
        Self { code: FtsErrorCode::TableNotFound, message: format!("fts index for predicate {predicate:?} was never initialized") }
    }

    pub fn query_error(message: impl Into<String>) -> Self {
        Self { code: FtsErrorCode::QueryError, message: message.into() }
    }
}

pub type FtsResult<T> = Result<T, FtsQueryError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Fts(#[from] FtsQueryError),
    #[error("vector store error: {0}")]
    Vector(String),
    #[error(transparent)]
    Blob(#[from] edgegraph_store::BlobError),
}

pub type IndexResult<T> = Result<T, IndexError>;
