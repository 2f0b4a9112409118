use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::entity_id::EntityId;
use crate::error::{ValidationError, ValidationResult};

/// A geographic point, `(lat, lng)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A closed polygon ring, stored as an ordered list of points. Querying is
/// restricted to point-in-bbox / nearest-k against `GEO_POINT`s (see
/// `edgegraph-index`); this type is storage-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct GeoPolygon {
    pub rings: Vec<Vec<GeoPoint>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct GeoLineString {
    pub points: Vec<GeoPoint>,
}

/// The sum type of 18 value kinds a triple's object may hold.
///
/// `NULL` doubles as the tombstone marker (see [`crate::Triple`]): a triple
/// whose object is `Null` hides all earlier triples for its
/// `(subject, predicate)` pair until a later non-null write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum TypedValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    /// Finite `f64`; `NaN` is permitted (classified as `Float64` by
    /// [`infer_kind`]) but `+Infinity`/`-Infinity` are rejected by
    /// [`validate_typed`].
    Float64(f64),
    String(String),
    Binary(Vec<u8>),
    /// Unsigned epoch milliseconds.
    Timestamp(u64),
    /// Days since epoch.
    Date(i64),
    /// ISO-8601 duration string beginning with `P`.
    Duration(String),
    Ref(EntityId),
    RefArray(Vec<EntityId>),
    Json(JsonValue),
    GeoPoint(GeoPoint),
    GeoPolygon(GeoPolygon),
    GeoLineString(GeoLineString),
    Url(String),
    Vector(Vec<f64>),
}

/// Kind discriminant mirroring the `obj_type` storage column. Stable wire
/// values: used by the chunk codec's object-kind column and by the
/// structured-store `obj_type` column, so the numbering here is part of the
/// on-disk contract and must never be renumbered once shipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueKind {
    Null = 0,
    Bool = 1,
    Int32 = 2,
    Int64 = 3,
    Float64 = 4,
    String = 5,
    Binary = 6,
    Timestamp = 7,
    Date = 8,
    Duration = 9,
    Ref = 10,
    RefArray = 11,
    Json = 12,
    GeoPoint = 13,
    GeoPolygon = 14,
    GeoLineString = 15,
    Url = 16,
    Vector = 17,
}

impl ValueKind {
    pub fn from_u8(raw: u8) -> ValidationResult<Self> {
        Ok(match raw {
            0 => Self::Null,
            1 => Self::Bool,
            2 => Self::Int32,
            3 => Self::Int64,
            4 => Self::Float64,
            5 => Self::String,
            6 => Self::Binary,
            7 => Self::Timestamp,
            8 => Self::Date,
            9 => Self::Duration,
            10 => Self::Ref,
            11 => Self::RefArray,
            12 => Self::Json,
            13 => Self::GeoPoint,
            14 => Self::GeoPolygon,
            15 => Self::GeoLineString,
            16 => Self::Url,
            17 => Self::Vector,
            other => return Err(ValidationError::UnknownKind(other)),
        })
    }
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Null => ValueKind::Null,
            TypedValue::Bool(_) => ValueKind::Bool,
            TypedValue::Int32(_) => ValueKind::Int32,
            TypedValue::Int64(_) => ValueKind::Int64,
            TypedValue::Float64(_) => ValueKind::Float64,
            TypedValue::String(_) => ValueKind::String,
            TypedValue::Binary(_) => ValueKind::Binary,
            TypedValue::Timestamp(_) => ValueKind::Timestamp,
            TypedValue::Date(_) => ValueKind::Date,
            TypedValue::Duration(_) => ValueKind::Duration,
            TypedValue::Ref(_) => ValueKind::Ref,
            TypedValue::RefArray(_) => ValueKind::RefArray,
            TypedValue::Json(_) => ValueKind::Json,
            TypedValue::GeoPoint(_) => ValueKind::GeoPoint,
            TypedValue::GeoPolygon(_) => ValueKind::GeoPolygon,
            TypedValue::GeoLineString(_) => ValueKind::GeoLineString,
            TypedValue::Url(_) => ValueKind::Url,
            TypedValue::Vector(_) => ValueKind::Vector,
        }
    }

    /// True iff this is the tombstone marker.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, TypedValue::Null)
    }
}

/// Validates a [`TypedValue`]'s payload against its kind-specific
/// constraints. Unknown kinds can't occur for an in-memory `TypedValue`
/// (the enum is closed); this entry point exists mainly to validate values
/// decoded off the wire or out of a chunk, where a malformed discriminant
/// is possible.
pub fn validate_typed(v: &TypedValue) -> ValidationResult<()> {
    match v {
        TypedValue::Null | TypedValue::Bool(_) | TypedValue::String(_) | TypedValue::Binary(_) => {
            Ok(())
        }
        TypedValue::Int32(n) => {
            if (i32::MIN..=i32::MAX).contains(&(*n)) {
                Ok(())
            } else {
                Err(ValidationError::Int32OutOfRange(*n as i64))
            }
        }
        TypedValue::Int64(_) | TypedValue::Timestamp(_) | TypedValue::Date(_) => Ok(()),
        TypedValue::Float64(f) => {
            if f.is_infinite() {
                Err(ValidationError::NonFiniteFloat)
            } else {
                Ok(())
            }
        }
        TypedValue::Duration(s) => {
            if is_valid_iso8601_duration(s) {
                Ok(())
            } else {
                Err(ValidationError::InvalidDuration(s.clone()))
            }
        }
        TypedValue::Ref(_) => Ok(()),
        TypedValue::RefArray(_) => Ok(()),
        TypedValue::Json(_) => Ok(()),
        TypedValue::GeoPoint(p) => {
            if p.lat.is_finite() && p.lng.is_finite() {
                Ok(())
            } else {
                Err(ValidationError::NonFiniteGeoPoint)
            }
        }
        TypedValue::GeoPolygon(poly) => {
            for ring in &poly.rings {
                for p in ring {
                    if !(p.lat.is_finite() && p.lng.is_finite()) {
                        return Err(ValidationError::NonFiniteGeoPoint);
                    }
                }
            }
            Ok(())
        }
        TypedValue::GeoLineString(ls) => {
            for p in &ls.points {
                if !(p.lat.is_finite() && p.lng.is_finite()) {
                    return Err(ValidationError::NonFiniteGeoPoint);
                }
            }
            Ok(())
        }
        TypedValue::Url(_) => Ok(()),
        TypedValue::Vector(elems) => {
            for (i, e) in elems.iter().enumerate() {
                if !e.is_finite() {
                    return Err(ValidationError::NonFiniteVectorElement(i));
                }
            }
            Ok(())
        }
    }
}

impl BorshSerialize for TypedValue {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        BorshSerialize::serialize(&(self.kind() as u8), writer)?;
        match self {
            TypedValue::Null => Ok(()),
            TypedValue::Bool(b) => BorshSerialize::serialize(b, writer),
            TypedValue::Int32(n) => BorshSerialize::serialize(n, writer),
            TypedValue::Int64(n) => BorshSerialize::serialize(n, writer),
            TypedValue::Float64(f) => BorshSerialize::serialize(f, writer),
            TypedValue::String(s) => BorshSerialize::serialize(s, writer),
            TypedValue::Binary(b) => BorshSerialize::serialize(b, writer),
            TypedValue::Timestamp(u) => BorshSerialize::serialize(u, writer),
            TypedValue::Date(d) => BorshSerialize::serialize(d, writer),
            TypedValue::Duration(s) => BorshSerialize::serialize(s, writer),
            TypedValue::Ref(e) => BorshSerialize::serialize(e, writer),
            TypedValue::RefArray(refs) => BorshSerialize::serialize(refs, writer),
            TypedValue::Json(v) => {
                let text = serde_json::to_string(v)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                BorshSerialize::serialize(&text, writer)
            }
            TypedValue::GeoPoint(p) => BorshSerialize::serialize(p, writer),
            TypedValue::GeoPolygon(p) => BorshSerialize::serialize(p, writer),
            TypedValue::GeoLineString(l) => BorshSerialize::serialize(l, writer),
            TypedValue::Url(s) => BorshSerialize::serialize(s, writer),
            TypedValue::Vector(v) => BorshSerialize::serialize(v, writer),
        }
    }
}

/// Manual `Borsh` impl (rather than `#[derive]`) because `Json` wraps a
/// `serde_json::Value`, which has no Borsh implementation; it round-trips
/// as its JSON text instead. Used only for the row table's on-disk
/// snapshot — never for the GraphCol chunk body, which has its own
/// hand-rolled byte layout in `edgegraph-chunk`.
impl BorshDeserialize for TypedValue {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let kind = u8::deserialize_reader(reader)?;
        let kind = ValueKind::from_u8(kind).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(match kind {
            ValueKind::Null => TypedValue::Null,
            ValueKind::Bool => TypedValue::Bool(bool::deserialize_reader(reader)?),
            ValueKind::Int32 => TypedValue::Int32(i32::deserialize_reader(reader)?),
            ValueKind::Int64 => TypedValue::Int64(i64::deserialize_reader(reader)?),
            ValueKind::Float64 => TypedValue::Float64(f64::deserialize_reader(reader)?),
            ValueKind::String => TypedValue::String(String::deserialize_reader(reader)?),
            ValueKind::Binary => TypedValue::Binary(Vec::<u8>::deserialize_reader(reader)?),
            ValueKind::Timestamp => TypedValue::Timestamp(u64::deserialize_reader(reader)?),
            ValueKind::Date => TypedValue::Date(i64::deserialize_reader(reader)?),
            ValueKind::Duration => TypedValue::Duration(String::deserialize_reader(reader)?),
            ValueKind::Ref => TypedValue::Ref(EntityId::deserialize_reader(reader)?),
            ValueKind::RefArray => TypedValue::RefArray(Vec::<EntityId>::deserialize_reader(reader)?),
            ValueKind::Json => {
                let text = String::deserialize_reader(reader)?;
                let value = serde_json::from_str(&text)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                TypedValue::Json(value)
            }
            ValueKind::GeoPoint => TypedValue::GeoPoint(GeoPoint::deserialize_reader(reader)?),
            ValueKind::GeoPolygon => TypedValue::GeoPolygon(GeoPolygon::deserialize_reader(reader)?),
            ValueKind::GeoLineString => TypedValue::GeoLineString(GeoLineString::deserialize_reader(reader)?),
            ValueKind::Url => TypedValue::Url(String::deserialize_reader(reader)?),
            ValueKind::Vector => TypedValue::Vector(Vec::<f64>::deserialize_reader(reader)?),
        })
    }
}

/// Maps a host JSON value to the [`TypedValue`] kind a caller would expect
/// if they did not specify one explicitly. `NaN` (encoded as JSON `null` by
/// `serde_json` unless using an extension) is classified `Float64` here
/// because this function operates on an already-parsed Rust `f64`, not the
/// JSON wire form; validation-reject sites decide separately whether NaN is
/// acceptable for a given column.
pub fn infer_kind(native: &JsonValue) -> ValueKind {
    match native {
        JsonValue::Null => ValueKind::Null,
        JsonValue::Bool(_) => ValueKind::Bool,
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() {
                    ValueKind::Int32
                } else {
                    ValueKind::Int64
                }
            } else {
                ValueKind::Float64
            }
        }
        JsonValue::String(s) => {
            if s.starts_with("http://") || s.starts_with("https://") {
                ValueKind::Url
            } else if s.starts_with('P') && is_valid_iso8601_duration(s) {
                ValueKind::Duration
            } else {
                ValueKind::String
            }
        }
        JsonValue::Array(_) => ValueKind::Json,
        JsonValue::Object(_) => ValueKind::Json,
    }
}

/// Matches `P(\d+Y)?(\d+M)?(\d+W)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?`
/// with at least one component present. Hand-rolled rather than via the
/// `regex` crate: the grammar is small, fixed, and only used at triple
/// validation time, so a short state machine is both clearer and avoids
/// pulling a regex engine into the wire-format-adjacent validation path.
fn is_valid_iso8601_duration(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('P') else { return false };
    if rest.is_empty() {
        return false;
    }
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut any_component = false;
    let mut cursor = date_part;
    for unit in ['Y', 'M', 'W', 'D'] {
        match take_uint_component(cursor, unit) {
            Some(next) => {
                any_component = true;
                cursor = next;
            }
            None => continue,
        }
    }
    if !cursor.is_empty() {
        return false;
    }

    if let Some(time_part) = time_part {
        if time_part.is_empty() {
            return false;
        }
        let mut cursor = time_part;
        for unit in ['H', 'M'] {
            if let Some(next) = take_uint_component(cursor, unit) {
                any_component = true;
                cursor = next;
            }
        }
        if let Some(next) = take_decimal_component(cursor, 'S') {
            any_component = true;
            cursor = next;
        }
        if !cursor.is_empty() {
            return false;
        }
    }

    any_component
}

fn take_uint_component<'a>(s: &'a str, unit: char) -> Option<&'a str> {
    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digits_end == 0 {
        return None;
    }
    let rest = &s[digits_end..];
    let mut chars = rest.chars();
    if chars.next() == Some(unit) {
        Some(chars.as_str())
    } else {
        None
    }
}

fn take_decimal_component<'a>(s: &'a str, unit: char) -> Option<&'a str> {
    let mut idx = 0;
    let bytes = s.as_bytes();
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == 0 {
        return None;
    }
    if idx < bytes.len() && bytes[idx] == b'.' {
        let mut frac_end = idx + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end == idx + 1 {
            return None;
        }
        idx = frac_end;
    }
    let rest = &s[idx..];
    let mut chars = rest.chars();
    if chars.next() == Some(unit) {
        Some(chars.as_str())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_int32_bounds() {
        assert!(validate_typed(&TypedValue::Int32(i32::MAX)).is_ok());
        assert!(validate_typed(&TypedValue::Int32(i32::MIN)).is_ok());
    }

    #[test]
    fn rejects_infinite_float() {
        assert!(validate_typed(&TypedValue::Float64(f64::INFINITY)).is_err());
        assert!(validate_typed(&TypedValue::Float64(f64::NEG_INFINITY)).is_err());
    }

    #[test]
    fn permits_nan_float() {
        assert!(validate_typed(&TypedValue::Float64(f64::NAN)).is_ok());
    }

    #[test]
    fn validates_durations() {
        for good in ["P1Y", "P1Y2M3D", "PT1H", "PT1.5S", "P1W", "P2YT3H4M5.5S"] {
            assert!(
                validate_typed(&TypedValue::Duration(good.to_string())).is_ok(),
                "{good} should be valid"
            );
        }
        for bad in ["P", "1Y", "PT", "PXY", "P1Z", ""] {
            assert!(
                validate_typed(&TypedValue::Duration(bad.to_string())).is_err(),
                "{bad} should be invalid"
            );
        }
    }

    #[test]
    fn rejects_non_finite_vector_elements() {
        let v = TypedValue::Vector(vec![1.0, f64::NAN, 2.0]);
        // NaN is not finite per f64::is_finite, so this must fail even
        // though bare Float64 permits NaN; VECTOR's constraint is strictly
        // "finite floats" per spec.
        assert!(validate_typed(&v).is_err());
    }

    #[test]
    fn rejects_non_finite_geo_point() {
        let p = GeoPoint { lat: f64::NAN, lng: 0.0 };
        assert!(validate_typed(&TypedValue::GeoPoint(p)).is_err());
    }

    #[test]
    fn typed_value_borsh_round_trips() {
        let values = vec![
            TypedValue::Null,
            TypedValue::Bool(true),
            TypedValue::Int64(-9),
            TypedValue::String("hi".into()),
            TypedValue::Json(serde_json::json!({"a": 1})),
            TypedValue::Vector(vec![1.0, 2.5]),
        ];
        for v in values {
            let bytes = borsh::to_vec(&v).unwrap();
            let restored: TypedValue = borsh::from_slice(&bytes).unwrap();
            assert_eq!(v, restored);
        }
    }

    #[test]
    fn infers_kind_from_json() {
        assert_eq!(infer_kind(&serde_json::json!(null)), ValueKind::Null);
        assert_eq!(infer_kind(&serde_json::json!(true)), ValueKind::Bool);
        assert_eq!(infer_kind(&serde_json::json!(5)), ValueKind::Int32);
        assert_eq!(infer_kind(&serde_json::json!(5_000_000_000i64)), ValueKind::Int64);
        assert_eq!(infer_kind(&serde_json::json!(1.5)), ValueKind::Float64);
        assert_eq!(infer_kind(&serde_json::json!("hello")), ValueKind::String);
        assert_eq!(infer_kind(&serde_json::json!("https://ex.com")), ValueKind::Url);
        assert_eq!(infer_kind(&serde_json::json!([1, 2])), ValueKind::Json);
    }
}
