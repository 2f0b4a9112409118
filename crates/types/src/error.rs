use thiserror::Error;

/// Validation failure kinds, matching the `Validation` bucket of the error
/// taxonomy: never retried, always surfaced verbatim to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("entity id exceeds max length {max} (was {actual})")]
    EntityIdTooLong { max: usize, actual: usize },
    #[error("entity id {0:?} is not an absolute http(s) url")]
    EntityIdNotAbsoluteUrl(String),
    #[error("predicate {0:?} does not match [A-Za-z_$][A-Za-z0-9_$]*")]
    InvalidPredicate(String),
    #[error("transaction id {0:?} is not a 26-character Crockford base32 string")]
    InvalidTransactionId(String),
    #[error("int32 value {0} out of range")]
    Int32OutOfRange(i64),
    #[error("float64 value is not finite")]
    NonFiniteFloat,
    #[error("duration string {0:?} does not match the ISO-8601 duration grammar")]
    InvalidDuration(String),
    #[error("geo point has non-finite lat/lng")]
    NonFiniteGeoPoint,
    #[error("vector element at index {0} is not finite")]
    NonFiniteVectorElement(usize),
    #[error("unknown typed-value kind discriminant {0}")]
    UnknownKind(u8),
}

pub type ValidationResult<T> = Result<T, ValidationError>;
