//! GraphCol: the columnar chunk codec (spec component C2).
//!
//! A chunk is an immutable, append-only byte buffer encoding a batch of
//! triples plus a footer that lets a caller holding only
//! `(footer_offset, footer_size)` — as stored in a manifest entry — fetch
//! just the entity index, then resolve one entity to a single contiguous
//! byte range for [`read_entity_slice`].
//!
//! Layout, in order, all integers little-endian:
//!
//! ```text
//! [ header ][ string_pool ][ ref_pool ][ blob_pool ][ row_image ][ footer ][ trailer(16B) ]
//! ```
//!
//! `row_image` is a sequence of fixed-size records, one per triple, sorted
//! by subject so that an entity's triples occupy one contiguous range.
//! Every pool reference inside a record is an *absolute* byte offset into
//! the whole chunk buffer, so [`read_entity_slice`] can resolve a record's
//! payload without needing the footer at all — only the row range itself.
//!
//! This binary form is the bit-exact contract (spec §4.2, §9 open
//! question: frozen here). A JSON encoding exists only as an ingestion
//! convenience in some teacher-adjacent tooling and is not implemented by
//! this crate.

mod error;

pub use error::{ChunkCodecError, ChunkResult};

use std::collections::BTreeMap;

use edgegraph_types::{EntityId, GeoLineString, GeoPoint, GeoPolygon, Predicate, Triple, TransactionId, TypedValue, ValueKind};

const MAGIC: &[u8; 4] = b"GCOL";
const VERSION: u16 = 1;

/// Size in bytes of one fixed-width row record.
const RECORD_SIZE: usize = 8 + 8 + 1 + 8 + 8 + 8 + 8 + 8 + 8 + 8;

/// The result of [`encode_chunk`]: the encoded bytes plus the footer
/// location a manifest entry should remember.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub bytes: Vec<u8>,
    pub footer_offset: u64,
    pub footer_size: u64,
}

/// One entry of the chunk's entity index: an entity id and the byte range
/// in the overall chunk buffer that holds all of that entity's triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIndexEntry {
    pub entity_id: String,
    pub byte_offset: u64,
    pub byte_length: u64,
}

/// The cheap-to-decode structure returned by [`decode_chunk_footer`]:
/// enough to plan byte-range fetches without touching the row data.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    pub entities: Vec<EntityIndexEntry>,
    pub string_pool_range: (u64, u64),
    pub ref_pool_range: (u64, u64),
    pub blob_pool_range: (u64, u64),
    pub row_image_range: (u64, u64),
}

impl ChunkIndex {
    /// Binary-searches the sorted entity index for `entity_id`.
    pub fn lookup(&self, entity_id: &str) -> Option<&EntityIndexEntry> {
        self.entities
            .binary_search_by(|e| e.entity_id.as_str().cmp(entity_id))
            .ok()
            .map(|i| &self.entities[i])
    }
}

/// Encodes `triples` into a GraphCol chunk buffer. Triples are grouped by
/// subject (stable within-subject order preserved) so the resulting entity
/// index maps each subject to one contiguous byte range.
pub fn encode_chunk(triples: &[Triple], namespace: &str) -> EncodedChunk {
    let mut string_pool = Vec::new();
    let mut ref_pool = Vec::new();
    let mut blob_pool = Vec::new();

    // Stable-group by subject, preserving each subject's first-seen order
    // and the relative order of its triples.
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, t) in triples.iter().enumerate() {
        let key = t.subject.as_str().to_string();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(i);
    }
    // `groups` (a BTreeMap) already yields subjects in sorted order, which
    // is what the footer's entity index wants; `order` is unused beyond
    // documenting the first-seen sequence for readers of this code.
    let _ = order;

    struct PendingRecord {
        subject_local: (u32, u32),
        predicate_local: (u32, u32),
        kind: u8,
        timestamp: u64,
        txid_local: (u32, u32),
        int_payload: i64,
        float_bits: u64,
        str_local: (u32, u32),
        ref_local: (u32, u32),
        blob_local: (u32, u32),
    }

    let mut records: Vec<PendingRecord> = Vec::with_capacity(triples.len());
    let mut entity_ranges: Vec<(String, usize, usize)> = Vec::new(); // (subject, start_record_idx, count)

    for (subject, idxs) in &groups {
        let start = records.len();
        for &i in idxs {
            let t = &triples[i];
            let subject_local = push_str(&mut string_pool, t.subject.as_str());
            let predicate_local = push_str(&mut string_pool, t.predicate.as_str());
            let txid_local = push_str(&mut string_pool, t.tx_id.as_str());

            let mut int_payload = 0i64;
            let mut float_bits = 0u64;
            let mut str_local = (0u32, 0u32);
            let mut ref_local = (0u32, 0u32);
            let mut blob_local = (0u32, 0u32);

            match &t.object {
                TypedValue::Null => {}
                TypedValue::Bool(b) => int_payload = *b as i64,
                TypedValue::Int32(n) => int_payload = *n as i64,
                TypedValue::Int64(n) => int_payload = *n,
                TypedValue::Float64(f) => float_bits = f.to_bits(),
                TypedValue::String(s) => str_local = push_str(&mut string_pool, s),
                TypedValue::Binary(b) => blob_local = push_bytes(&mut blob_pool, b),
                TypedValue::Timestamp(u) => int_payload = *u as i64,
                TypedValue::Date(d) => int_payload = *d,
                TypedValue::Duration(s) => str_local = push_str(&mut string_pool, s),
                TypedValue::Ref(e) => ref_local = push_str(&mut ref_pool, e.as_str()),
                TypedValue::RefArray(refs) => {
                    let mut buf = Vec::new();
                    buf.extend_from_slice(&(refs.len() as u32).to_le_bytes());
                    for r in refs {
                        let bytes = r.as_str().as_bytes();
                        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                        buf.extend_from_slice(bytes);
                    }
                    ref_local = push_bytes(&mut ref_pool, &buf);
                }
                TypedValue::Json(v) => {
                    let text = serde_json::to_vec(v).unwrap_or_default();
                    str_local = push_bytes_as_str_slot(&mut string_pool, &text);
                }
                TypedValue::GeoPoint(p) => {
                    let mut buf = Vec::with_capacity(16);
                    buf.extend_from_slice(&p.lat.to_le_bytes());
                    buf.extend_from_slice(&p.lng.to_le_bytes());
                    blob_local = push_bytes(&mut blob_pool, &buf);
                }
                TypedValue::GeoPolygon(poly) => {
                    let mut buf = Vec::new();
                    buf.extend_from_slice(&(poly.rings.len() as u32).to_le_bytes());
                    for ring in &poly.rings {
                        buf.extend_from_slice(&(ring.len() as u32).to_le_bytes());
                        for p in ring {
                            buf.extend_from_slice(&p.lat.to_le_bytes());
                            buf.extend_from_slice(&p.lng.to_le_bytes());
                        }
                    }
                    blob_local = push_bytes(&mut blob_pool, &buf);
                }
                TypedValue::GeoLineString(ls) => {
                    let mut buf = Vec::new();
                    buf.extend_from_slice(&(ls.points.len() as u32).to_le_bytes());
                    for p in &ls.points {
                        buf.extend_from_slice(&p.lat.to_le_bytes());
                        buf.extend_from_slice(&p.lng.to_le_bytes());
                    }
                    blob_local = push_bytes(&mut blob_pool, &buf);
                }
                TypedValue::Url(s) => str_local = push_str(&mut string_pool, s),
                TypedValue::Vector(elems) => {
                    let mut buf = Vec::with_capacity(4 + elems.len() * 8);
                    buf.extend_from_slice(&(elems.len() as u32).to_le_bytes());
                    for e in elems {
                        buf.extend_from_slice(&e.to_le_bytes());
                    }
                    blob_local = push_bytes(&mut blob_pool, &buf);
                }
            }

            records.push(PendingRecord {
                subject_local,
                predicate_local,
                kind: t.object.kind() as u8,
                timestamp: t.timestamp,
                txid_local,
                int_payload,
                float_bits,
                str_local,
                ref_local,
                blob_local,
            });
        }
        entity_ranges.push((subject.clone(), start, records.len() - start));
    }

    let namespace_bytes = namespace.as_bytes();
    let header_len = 4 + 2 + 2 + namespace_bytes.len();
    let string_pool_start = header_len as u64;
    let ref_pool_start = string_pool_start + string_pool.len() as u64;
    let blob_pool_start = ref_pool_start + ref_pool.len() as u64;
    let row_image_start = blob_pool_start + blob_pool.len() as u64;

    let resolve = |pool_start: u64, local: (u32, u32)| -> (u32, u32) {
        if local.1 == 0 {
            (0, 0)
        } else {
            ((pool_start + local.0 as u64) as u32, local.1)
        }
    };

    let mut row_image = Vec::with_capacity(records.len() * RECORD_SIZE);
    for r in &records {
        let subject = resolve(string_pool_start, r.subject_local);
        let predicate = resolve(string_pool_start, r.predicate_local);
        let txid = resolve(string_pool_start, r.txid_local);
        let str_ref = resolve(string_pool_start, r.str_local);
        let ref_ref = resolve(ref_pool_start, r.ref_local);
        let blob_ref = resolve(blob_pool_start, r.blob_local);

        row_image.extend_from_slice(&subject.0.to_le_bytes());
        row_image.extend_from_slice(&subject.1.to_le_bytes());
        row_image.extend_from_slice(&predicate.0.to_le_bytes());
        row_image.extend_from_slice(&predicate.1.to_le_bytes());
        row_image.push(r.kind);
        row_image.extend_from_slice(&r.timestamp.to_le_bytes());
        row_image.extend_from_slice(&txid.0.to_le_bytes());
        row_image.extend_from_slice(&txid.1.to_le_bytes());
        row_image.extend_from_slice(&r.int_payload.to_le_bytes());
        row_image.extend_from_slice(&r.float_bits.to_le_bytes());
        row_image.extend_from_slice(&str_ref.0.to_le_bytes());
        row_image.extend_from_slice(&str_ref.1.to_le_bytes());
        row_image.extend_from_slice(&ref_ref.0.to_le_bytes());
        row_image.extend_from_slice(&ref_ref.1.to_le_bytes());
        row_image.extend_from_slice(&blob_ref.0.to_le_bytes());
        row_image.extend_from_slice(&blob_ref.1.to_le_bytes());
    }
    debug_assert_eq!(row_image.len(), records.len() * RECORD_SIZE);

    let entity_index: Vec<EntityIndexEntry> = entity_ranges
        .into_iter()
        .map(|(subject, start, count)| EntityIndexEntry {
            entity_id: subject,
            byte_offset: row_image_start + (start * RECORD_SIZE) as u64,
            byte_length: (count * RECORD_SIZE) as u64,
        })
        .collect();

    let string_pool_len = string_pool.len() as u64;
    let ref_pool_len = ref_pool.len() as u64;
    let blob_pool_len = blob_pool.len() as u64;
    let row_image_len = row_image.len() as u64;

    let mut footer = Vec::new();
    footer.extend_from_slice(&(entity_index.len() as u32).to_le_bytes());
    for e in &entity_index {
        let bytes = e.entity_id.as_bytes();
        footer.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        footer.extend_from_slice(bytes);
        footer.extend_from_slice(&e.byte_offset.to_le_bytes());
        footer.extend_from_slice(&e.byte_length.to_le_bytes());
    }
    footer.extend_from_slice(&string_pool_start.to_le_bytes());
    footer.extend_from_slice(&string_pool_len.to_le_bytes());
    footer.extend_from_slice(&ref_pool_start.to_le_bytes());
    footer.extend_from_slice(&ref_pool_len.to_le_bytes());
    footer.extend_from_slice(&blob_pool_start.to_le_bytes());
    footer.extend_from_slice(&blob_pool_len.to_le_bytes());
    footer.extend_from_slice(&row_image_start.to_le_bytes());
    footer.extend_from_slice(&row_image_len.to_le_bytes());

    let footer_offset = row_image_start + row_image_len;
    let footer_size = footer.len() as u64;

    let mut bytes = Vec::with_capacity(footer_offset as usize + footer.len() + 16);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bytes.extend_from_slice(&(namespace_bytes.len() as u16).to_le_bytes());
    bytes.extend_from_slice(namespace_bytes);
    bytes.extend_from_slice(&string_pool);
    bytes.extend_from_slice(&ref_pool);
    bytes.extend_from_slice(&blob_pool);
    bytes.extend_from_slice(&row_image);
    bytes.extend_from_slice(&footer);
    bytes.extend_from_slice(&footer_offset.to_le_bytes());
    bytes.extend_from_slice(&footer_size.to_le_bytes());

    EncodedChunk { bytes, footer_offset, footer_size }
}

fn push_str(pool: &mut Vec<u8>, s: &str) -> (u32, u32) {
    push_bytes(pool, s.as_bytes())
}

fn push_bytes(pool: &mut Vec<u8>, b: &[u8]) -> (u32, u32) {
    let off = pool.len() as u32;
    pool.extend_from_slice(b);
    (off, b.len() as u32)
}

fn push_bytes_as_str_slot(pool: &mut Vec<u8>, b: &[u8]) -> (u32, u32) {
    push_bytes(pool, b)
}

/// Cheaply decodes just the footer: the entity index and the location of
/// every pool/section, without touching row bytes. `footer_offset` and
/// `footer_size` normally come from a manifest entry.
pub fn decode_chunk_footer(bytes: &[u8], footer_offset: u64, footer_size: u64) -> ChunkResult<ChunkIndex> {
    let end = footer_offset
        .checked_add(footer_size)
        .ok_or(ChunkCodecError::FooterOutOfBounds { offset: footer_offset, offset_plus_size: u64::MAX, len: bytes.len() })?;
    if end as usize > bytes.len() {
        return Err(ChunkCodecError::FooterOutOfBounds {
            offset: footer_offset,
            offset_plus_size: end,
            len: bytes.len(),
        });
    }
    verify_header(bytes)?;

    let footer = &bytes[footer_offset as usize..end as usize];
    let mut cursor = 0usize;
    let entity_count = read_u32(footer, &mut cursor)? as usize;
    let mut entities = Vec::with_capacity(entity_count);
    for _ in 0..entity_count {
        let id_len = read_u32(footer, &mut cursor)? as usize;
        let id_bytes = read_slice(footer, &mut cursor, id_len)?;
        let entity_id = String::from_utf8(id_bytes.to_vec())
            .map_err(|_| ChunkCodecError::MalformedPayload { column: "entity_index.id", row: 0, detail: "invalid utf-8".into() })?;
        let byte_offset = read_u64(footer, &mut cursor)?;
        let byte_length = read_u64(footer, &mut cursor)?;
        entities.push(EntityIndexEntry { entity_id, byte_offset, byte_length });
    }
    let string_pool_range = (read_u64(footer, &mut cursor)?, read_u64(footer, &mut cursor)?);
    let ref_pool_range = (read_u64(footer, &mut cursor)?, read_u64(footer, &mut cursor)?);
    let blob_pool_range = (read_u64(footer, &mut cursor)?, read_u64(footer, &mut cursor)?);
    let row_image_range = (read_u64(footer, &mut cursor)?, read_u64(footer, &mut cursor)?);

    Ok(ChunkIndex { entities, string_pool_range, ref_pool_range, blob_pool_range, row_image_range })
}

fn verify_header(bytes: &[u8]) -> ChunkResult<()> {
    if bytes.len() < 8 {
        return Err(ChunkCodecError::TooShort { need: 8, have: bytes.len() });
    }
    if &bytes[0..4] != MAGIC {
        return Err(ChunkCodecError::BadMagic);
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(ChunkCodecError::UnsupportedVersion(version));
    }
    Ok(())
}

/// Reads just the triples covering one entity, given the byte range a
/// manifest's entity index entry recorded for it. Every column reference
/// inside a record is an absolute offset into `bytes`, so this function
/// needs no footer at all — only the row range.
pub fn read_entity_slice(bytes: &[u8], byte_offset: u64, byte_length: u64) -> ChunkResult<Vec<Triple>> {
    if byte_length as usize % RECORD_SIZE != 0 {
        return Err(ChunkCodecError::MisalignedRowRange(byte_length));
    }
    let start = byte_offset as usize;
    let end = start
        .checked_add(byte_length as usize)
        .ok_or(ChunkCodecError::RowRangeOutOfBounds { offset: byte_offset, offset_plus_len: u64::MAX, buf_len: bytes.len() })?;
    if end > bytes.len() {
        return Err(ChunkCodecError::RowRangeOutOfBounds {
            offset: byte_offset,
            offset_plus_len: end as u64,
            buf_len: bytes.len(),
        });
    }
    let region = &bytes[start..end];
    let n = region.len() / RECORD_SIZE;
    let mut out = Vec::with_capacity(n);
    for row in 0..n {
        out.push(decode_record(bytes, &region[row * RECORD_SIZE..(row + 1) * RECORD_SIZE], row)?);
    }
    Ok(out)
}

fn decode_record(bytes: &[u8], record: &[u8], row: usize) -> ChunkResult<Triple> {
    let mut cursor = 0usize;
    let subject_off = read_u32(record, &mut cursor)?;
    let subject_len = read_u32(record, &mut cursor)?;
    let predicate_off = read_u32(record, &mut cursor)?;
    let predicate_len = read_u32(record, &mut cursor)?;
    let kind = record[cursor];
    cursor += 1;
    let timestamp = read_u64(record, &mut cursor)?;
    let txid_off = read_u32(record, &mut cursor)?;
    let txid_len = read_u32(record, &mut cursor)?;
    let int_payload = read_u64(record, &mut cursor)? as i64;
    let float_bits = read_u64(record, &mut cursor)?;
    let str_off = read_u32(record, &mut cursor)?;
    let str_len = read_u32(record, &mut cursor)?;
    let ref_off = read_u32(record, &mut cursor)?;
    let ref_len = read_u32(record, &mut cursor)?;
    let blob_off = read_u32(record, &mut cursor)?;
    let blob_len = read_u32(record, &mut cursor)?;

    let subject_str = slice_str(bytes, subject_off, subject_len, "subject", row)?;
    let predicate_str = slice_str(bytes, predicate_off, predicate_len, "predicate", row)?;
    let txid_str = slice_str(bytes, txid_off, txid_len, "tx_id", row)?;

    let subject = EntityId::parse(subject_str.to_string())?;
    let predicate = Predicate::parse(predicate_str.to_string())?;
    let tx_id = TransactionId::parse(txid_str.to_string())?;

    let value_kind = ValueKind::from_u8(kind)?;
    let object = decode_value(
        bytes,
        value_kind,
        int_payload,
        float_bits,
        (str_off, str_len),
        (ref_off, ref_len),
        (blob_off, blob_len),
        row,
    )?;

    Ok(Triple { subject, predicate, object, timestamp, tx_id })
}

#[allow(clippy::too_many_arguments)]
fn decode_value(
    bytes: &[u8],
    kind: ValueKind,
    int_payload: i64,
    float_bits: u64,
    str_ref: (u32, u32),
    ref_ref: (u32, u32),
    blob_ref: (u32, u32),
    row: usize,
) -> ChunkResult<TypedValue> {
    Ok(match kind {
        ValueKind::Null => TypedValue::Null,
        ValueKind::Bool => TypedValue::Bool(int_payload != 0),
        ValueKind::Int32 => TypedValue::Int32(int_payload as i32),
        ValueKind::Int64 => TypedValue::Int64(int_payload),
        ValueKind::Float64 => TypedValue::Float64(f64::from_bits(float_bits)),
        ValueKind::String => TypedValue::String(slice_str(bytes, str_ref.0, str_ref.1, "str_payload", row)?.to_string()),
        ValueKind::Binary => TypedValue::Binary(slice_bytes(bytes, blob_ref.0, blob_ref.1, "blob_payload", row)?.to_vec()),
        ValueKind::Timestamp => TypedValue::Timestamp(int_payload as u64),
        ValueKind::Date => TypedValue::Date(int_payload),
        ValueKind::Duration => TypedValue::Duration(slice_str(bytes, str_ref.0, str_ref.1, "str_payload", row)?.to_string()),
        ValueKind::Ref => {
            let s = slice_str(bytes, ref_ref.0, ref_ref.1, "ref_payload", row)?;
            TypedValue::Ref(EntityId::parse(s.to_string())?)
        }
        ValueKind::RefArray => {
            let raw = slice_bytes(bytes, ref_ref.0, ref_ref.1, "ref_payload", row)?;
            TypedValue::RefArray(decode_ref_array(raw, row)?)
        }
        ValueKind::Json => {
            let raw = slice_bytes(bytes, str_ref.0, str_ref.1, "str_payload", row)?;
            let value = serde_json::from_slice(raw).map_err(|e| ChunkCodecError::MalformedPayload {
                column: "json_payload",
                row,
                detail: e.to_string(),
            })?;
            TypedValue::Json(value)
        }
        ValueKind::GeoPoint => {
            let raw = slice_bytes(bytes, blob_ref.0, blob_ref.1, "blob_payload", row)?;
            TypedValue::GeoPoint(decode_geo_point(raw, row)?)
        }
        ValueKind::GeoPolygon => {
            let raw = slice_bytes(bytes, blob_ref.0, blob_ref.1, "blob_payload", row)?;
            TypedValue::GeoPolygon(decode_geo_polygon(raw, row)?)
        }
        ValueKind::GeoLineString => {
            let raw = slice_bytes(bytes, blob_ref.0, blob_ref.1, "blob_payload", row)?;
            TypedValue::GeoLineString(decode_geo_linestring(raw, row)?)
        }
        ValueKind::Url => TypedValue::Url(slice_str(bytes, str_ref.0, str_ref.1, "str_payload", row)?.to_string()),
        ValueKind::Vector => {
            let raw = slice_bytes(bytes, blob_ref.0, blob_ref.1, "blob_payload", row)?;
            TypedValue::Vector(decode_vector(raw, row)?)
        }
    })
}

fn decode_ref_array(raw: &[u8], row: usize) -> ChunkResult<Vec<EntityId>> {
    let mut cursor = 0usize;
    let count = read_u32(raw, &mut cursor)? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_u32(raw, &mut cursor)? as usize;
        let s = read_slice(raw, &mut cursor, len)?;
        let s = std::str::from_utf8(s)
            .map_err(|_| ChunkCodecError::InvalidUtf8 { column: "ref_array", row })?;
        out.push(EntityId::parse(s.to_string())?);
    }
    Ok(out)
}

fn decode_geo_point(raw: &[u8], row: usize) -> ChunkResult<GeoPoint> {
    if raw.len() != 16 {
        return Err(ChunkCodecError::MalformedPayload { column: "geo_point", row, detail: "expected 16 bytes".into() });
    }
    let lat = f64::from_le_bytes(raw[0..8].try_into().unwrap());
    let lng = f64::from_le_bytes(raw[8..16].try_into().unwrap());
    Ok(GeoPoint { lat, lng })
}

fn decode_geo_polygon(raw: &[u8], row: usize) -> ChunkResult<GeoPolygon> {
    let mut cursor = 0usize;
    let ring_count = read_u32(raw, &mut cursor)? as usize;
    let mut rings = Vec::with_capacity(ring_count);
    for _ in 0..ring_count {
        let point_count = read_u32(raw, &mut cursor)? as usize;
        let mut points = Vec::with_capacity(point_count);
        for _ in 0..point_count {
            let lat = f64::from_le_bytes(read_slice(raw, &mut cursor, 8)?.try_into().unwrap());
            let lng = f64::from_le_bytes(read_slice(raw, &mut cursor, 8)?.try_into().unwrap());
            points.push(GeoPoint { lat, lng });
        }
        rings.push(points);
    }
    let _ = row;
    Ok(GeoPolygon { rings })
}

fn decode_geo_linestring(raw: &[u8], row: usize) -> ChunkResult<GeoLineString> {
    let mut cursor = 0usize;
    let point_count = read_u32(raw, &mut cursor)? as usize;
    let mut points = Vec::with_capacity(point_count);
    for _ in 0..point_count {
        let lat = f64::from_le_bytes(read_slice(raw, &mut cursor, 8)?.try_into().unwrap());
        let lng = f64::from_le_bytes(read_slice(raw, &mut cursor, 8)?.try_into().unwrap());
        points.push(GeoPoint { lat, lng });
    }
    let _ = row;
    Ok(GeoLineString { points })
}

fn decode_vector(raw: &[u8], row: usize) -> ChunkResult<Vec<f64>> {
    let mut cursor = 0usize;
    let count = read_u32(raw, &mut cursor)? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let bytes = read_slice(raw, &mut cursor, 8)?;
        out.push(f64::from_le_bytes(bytes.try_into().unwrap()));
    }
    let _ = row;
    Ok(out)
}

fn slice_str<'a>(bytes: &'a [u8], off: u32, len: u32, column: &'static str, row: usize) -> ChunkResult<&'a str> {
    let raw = slice_bytes(bytes, off, len, column, row)?;
    std::str::from_utf8(raw).map_err(|_| ChunkCodecError::InvalidUtf8 { column, row })
}

fn slice_bytes<'a>(bytes: &'a [u8], off: u32, len: u32, column: &'static str, row: usize) -> ChunkResult<&'a [u8]> {
    let start = off as usize;
    let end = start + len as usize;
    bytes.get(start..end).ok_or(ChunkCodecError::ColumnOutOfBounds { column, row })
}

fn read_u32(buf: &[u8], cursor: &mut usize) -> ChunkResult<u32> {
    let bytes = read_slice(buf, cursor, 4)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_u64(buf: &[u8], cursor: &mut usize) -> ChunkResult<u64> {
    let bytes = read_slice(buf, cursor, 8)?;
    Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_slice<'a>(buf: &'a [u8], cursor: &mut usize, len: usize) -> ChunkResult<&'a [u8]> {
    let start = *cursor;
    let end = start + len;
    let slice = buf.get(start..end).ok_or(ChunkCodecError::TooShort { need: end, have: buf.len() })?;
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegraph_types::{GeoPoint as GP, TxIdGenerator};

    fn mk_triple(subject: &str, predicate: &str, object: TypedValue, ts: u64, gen: &TxIdGenerator) -> Triple {
        Triple {
            subject: EntityId::parse(subject.to_string()).unwrap(),
            predicate: Predicate::parse(predicate.to_string()).unwrap(),
            object,
            timestamp: ts,
            tx_id: gen.next(ts),
        }
    }

    #[test]
    fn round_trips_mixed_kinds() {
        let gen = TxIdGenerator::new();
        let triples = vec![
            mk_triple("https://ex.com/e1", "name", TypedValue::String("Alice".into()), 1, &gen),
            mk_triple("https://ex.com/e1", "age", TypedValue::Int32(30), 2, &gen),
            mk_triple("https://ex.com/e1", "friend", TypedValue::Ref(EntityId::parse("https://ex.com/e2".into()).unwrap()), 3, &gen),
            mk_triple("https://ex.com/e1", "loc", TypedValue::GeoPoint(GP { lat: 1.5, lng: -2.5 }), 4, &gen),
            mk_triple("https://ex.com/e1", "tags", TypedValue::RefArray(vec![
                EntityId::parse("https://ex.com/t1".into()).unwrap(),
                EntityId::parse("https://ex.com/t2".into()).unwrap(),
            ]), 5, &gen),
            mk_triple("https://ex.com/e1", "embedding", TypedValue::Vector(vec![1.0, 2.0, 3.5]), 6, &gen),
            mk_triple("https://ex.com/e2", "name", TypedValue::String("Bob".into()), 7, &gen),
            mk_triple("https://ex.com/e2", "deleted", TypedValue::Null, 8, &gen),
        ];

        let encoded = encode_chunk(&triples, "https://ex.com");
        let index = decode_chunk_footer(&encoded.bytes, encoded.footer_offset, encoded.footer_size).unwrap();
        assert_eq!(index.entities.len(), 2);

        let e1 = index.lookup("https://ex.com/e1").unwrap();
        let decoded = read_entity_slice(&encoded.bytes, e1.byte_offset, e1.byte_length).unwrap();
        assert_eq!(decoded.len(), 6);
        assert_eq!(decoded[0].object, TypedValue::String("Alice".into()));
        assert_eq!(decoded[1].object, TypedValue::Int32(30));

        let e2 = index.lookup("https://ex.com/e2").unwrap();
        let decoded2 = read_entity_slice(&encoded.bytes, e2.byte_offset, e2.byte_length).unwrap();
        assert_eq!(decoded2.len(), 2);
        assert!(decoded2[1].is_tombstone());
    }

    #[test]
    fn entity_index_is_sorted() {
        let gen = TxIdGenerator::new();
        let triples = vec![
            mk_triple("https://ex.com/zeta", "p", TypedValue::Bool(true), 1, &gen),
            mk_triple("https://ex.com/alpha", "p", TypedValue::Bool(false), 2, &gen),
        ];
        let encoded = encode_chunk(&triples, "https://ex.com");
        let index = decode_chunk_footer(&encoded.bytes, encoded.footer_offset, encoded.footer_size).unwrap();
        let ids: Vec<_> = index.entities.iter().map(|e| e.entity_id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 64];
        assert!(decode_chunk_footer(&bytes, 0, 16).is_err());
    }

    #[test]
    fn footer_round_trip_preserves_section_ranges() {
        let gen = TxIdGenerator::new();
        let triples = vec![mk_triple("https://ex.com/e1", "p", TypedValue::Int64(7), 1, &gen)];
        let encoded = encode_chunk(&triples, "ns");
        let index = decode_chunk_footer(&encoded.bytes, encoded.footer_offset, encoded.footer_size).unwrap();
        assert!(index.row_image_range.1 > 0);
    }
}
