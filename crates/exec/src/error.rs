use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no shard registered with the executor for shard id {0}")]
    ShardNotFound(u32),
    #[error("source entity id is malformed: {0}")]
    InvalidSourceId(#[from] edgegraph_types::ValidationError),
    #[error(transparent)]
    Store(#[from] edgegraph_store::StoreError),
}

pub type ExecResult<T> = Result<T, ExecError>;
