use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Default bound on [`EntityId`] character length, per spec.
pub const DEFAULT_MAX_ENTITY_ID_LEN: usize = 2048;

/// An absolute `http`/`https` URL identifying an entity. There is no
/// separate integer id visible to clients: this string *is* the identity.
///
/// Subject, object-reference and `REF_ARRAY` element values all share this
/// type, so validation happens once here rather than once per call site.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Validates `raw` against the default length bound and constructs an
    /// [`EntityId`]. Rejects (rather than truncates) identifiers that are
    /// too long or that are not absolute `http`/`https` URLs.
    pub fn parse(raw: impl Into<String>) -> ValidationResult<Self> {
        Self::parse_with_max_len(raw, DEFAULT_MAX_ENTITY_ID_LEN)
    }

    pub fn parse_with_max_len(raw: impl Into<String>, max_len: usize) -> ValidationResult<Self> {
        let raw = raw.into();
        if raw.chars().count() > max_len {
            return Err(ValidationError::EntityIdTooLong { max: max_len, actual: raw.chars().count() });
        }
        if !is_absolute_http_url(&raw) {
            return Err(ValidationError::EntityIdNotAbsoluteUrl(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl BorshSerialize for EntityId {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        BorshSerialize::serialize(&self.0, writer)
    }
}

impl BorshDeserialize for EntityId {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let raw = String::deserialize_reader(reader)?;
        EntityId::parse(raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Cheap structural check: scheme must be `http://` or `https://`, followed
/// by a non-empty authority. This intentionally does not pull in a full URL
/// parser — the spec only requires scheme + absoluteness, not RFC 3986
/// normalization, and predicates/chunk keys depend on the identifier's raw
/// bytes being stable.
fn is_absolute_http_url(raw: &str) -> bool {
    let rest = if let Some(r) = raw.strip_prefix("https://") {
        r
    } else if let Some(r) = raw.strip_prefix("http://") {
        r
    } else {
        return false;
    };
    !rest.is_empty() && !rest.starts_with('/') && raw.chars().all(|c| !c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_urls() {
        assert!(EntityId::parse("https://ex.com/e1").is_ok());
        assert!(EntityId::parse("http://ex.com/e1").is_ok());
    }

    #[test]
    fn rejects_relative_or_non_http() {
        assert!(EntityId::parse("/e1").is_err());
        assert!(EntityId::parse("ftp://ex.com/e1").is_err());
        assert!(EntityId::parse("not a url").is_err());
    }

    #[test]
    fn rejects_too_long() {
        let long = format!("https://ex.com/{}", "a".repeat(3000));
        assert!(matches!(
            EntityId::parse(long),
            Err(ValidationError::EntityIdTooLong { .. })
        ));
    }

    #[test]
    fn rejects_whitespace() {
        assert!(EntityId::parse("https://ex.com/e 1").is_err());
    }
}
