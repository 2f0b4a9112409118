use thiserror::Error;

/// Parse/codec failures, surfaced verbatim per the error taxonomy's
/// "Parse / codec" bucket: malformed chunk bytes are never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkCodecError {
    #[error("buffer too short: need at least {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
    #[error("bad magic bytes: expected GCOL")]
    BadMagic,
    #[error("unsupported chunk format version {0}")]
    UnsupportedVersion(u16),
    #[error("footer byte range [{offset}, {offset_plus_size}) is out of bounds for a buffer of length {len}")]
    FooterOutOfBounds { offset: u64, offset_plus_size: u64, len: usize },
    #[error("row image byte range [{offset}, {offset_plus_len}) is out of bounds for a buffer of length {buf_len}")]
    RowRangeOutOfBounds { offset: u64, offset_plus_len: u64, buf_len: usize },
    #[error("row image byte range length {0} is not a multiple of the fixed record size")]
    MisalignedRowRange(u64),
    #[error("column {column} for row {row} references bytes outside the chunk buffer")]
    ColumnOutOfBounds { column: &'static str, row: usize },
    #[error("malformed utf-8 in column {column} for row {row}")]
    InvalidUtf8 { column: &'static str, row: usize },
    #[error("malformed value payload in column {column} for row {row}: {detail}")]
    MalformedPayload { column: &'static str, row: usize, detail: String },
    #[error("triple failed validation: {0}")]
    Validation(#[from] edgegraph_types::ValidationError),
}

pub type ChunkResult<T> = Result<T, ChunkCodecError>;
