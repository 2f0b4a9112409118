use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// A short identifier matching `[A-Za-z_$][A-Za-z0-9_$]*`.
///
/// Predicates are used both as a triple field and, unsafely if not
/// validated, as a column/query-composition key. The invariant this type
/// exists to uphold: a [`Predicate`] is never constructed except through
/// [`Predicate::parse`], so every call site that accepts one downstream
/// (FTS query composition, RPC dispatch) can treat it as pre-sanitized and
/// never concatenate untrusted strings into a query.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(String);

impl Predicate {
    pub fn parse(raw: impl Into<String>) -> ValidationResult<Self> {
        let raw = raw.into();
        if is_valid_predicate(&raw) {
            Ok(Self(raw))
        } else {
            Err(ValidationError::InvalidPredicate(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Predicate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl BorshSerialize for Predicate {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        BorshSerialize::serialize(&self.0, writer)
    }
}

impl BorshDeserialize for Predicate {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let raw = String::deserialize_reader(reader)?;
        Predicate::parse(raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn is_valid_predicate(raw: &str) -> bool {
    let mut chars = raw.chars();
    let Some(first) = chars.next() else { return false };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_predicates() {
        for p in ["name", "_hidden", "$type", "friend_of", "a1"] {
            assert!(Predicate::parse(p).is_ok(), "{p} should be valid");
        }
    }

    #[test]
    fn rejects_punctuation_and_whitespace() {
        for p in ["foo:bar", "has space", "", "1leading", "foo.bar"] {
            assert!(Predicate::parse(p).is_err(), "{p} should be rejected");
        }
    }
}
