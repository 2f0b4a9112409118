//! The typed-value model (spec component C1): entity identifiers,
//! predicates, transaction ids, the 18-variant object value union, and the
//! triple record built from them.

mod entity_id;
mod error;
mod predicate;
mod triple;
mod tx_id;
mod value;

pub use entity_id::{EntityId, DEFAULT_MAX_ENTITY_ID_LEN};
pub use error::{ValidationError, ValidationResult};
pub use predicate::Predicate;
pub use triple::{validate_triple, Triple};
pub use tx_id::{TransactionId, TxIdGenerator};
pub use value::{
    infer_kind, validate_typed, GeoLineString, GeoPoint, GeoPolygon, TypedValue, ValueKind,
};
