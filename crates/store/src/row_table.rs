//! The per-shard row table (spec §4.4): columns mirroring the typed-value
//! union plus an `obj_type` discriminator, held in memory behind a
//! `parking_lot::RwLock` rather than a real SQL engine — this workspace's
//! shard is edge-deployed and small enough that an in-memory table with a
//! borsh-encoded snapshot for restart recovery stands in for the
//! structured per-shard store the spec names as a collaborator.

use std::collections::{HashMap, HashSet};

use borsh::{BorshDeserialize, BorshSerialize};
use parking_lot::RwLock;

use edgegraph_types::{validate_triple, EntityId, Predicate, Triple, TypedValue};

use crate::error::{StoreError, StoreResult};

/// One row as persisted: a non-validating mirror of `Triple`, borsh-encoded
/// for snapshotting. Decoding re-validates (see [`RowTable::restore`]),
/// matching `EntityId`/`Predicate`'s own re-validating `Borsh` impls.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
struct StoredRow {
    subject: EntityId,
    predicate: Predicate,
    object: TypedValue,
    timestamp: u64,
    tx_id: String,
}

impl From<&Triple> for StoredRow {
    fn from(t: &Triple) -> Self {
        Self {
            subject: t.subject.clone(),
            predicate: t.predicate.clone(),
            object: t.object.clone(),
            timestamp: t.timestamp,
            tx_id: t.tx_id.as_str().to_string(),
        }
    }
}

impl StoredRow {
    fn into_triple(self) -> StoreResult<Triple> {
        let tx_id = edgegraph_types::TransactionId::parse(self.tx_id).map_err(|e| StoreError::RowParse {
            column: "tx_id",
            detail: e.to_string(),
        })?;
        Ok(Triple { subject: self.subject, predicate: self.predicate, object: self.object, timestamp: self.timestamp, tx_id })
    }
}

type VersionList = Vec<Triple>;

#[derive(Default)]
struct Inner {
    rows: HashMap<EntityId, HashMap<Predicate, VersionList>>,
    predicate_index: HashMap<Predicate, HashSet<EntityId>>,
}

/// A shard's row table: MVCC get/insert/update/delete over `(subject,
/// predicate)` pairs, each holding a timestamp-ordered version history.
pub struct RowTable {
    inner: RwLock<Inner>,
}

impl RowTable {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    /// Validates and inserts one triple.
    pub fn insert(&self, triple: Triple) -> StoreResult<()> {
        let errors = validate_triple(&triple);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        self.insert_unchecked(triple);
        Ok(())
    }

    /// Validates and inserts a batch atomically: if any triple fails
    /// validation, no triple in the batch is persisted.
    pub fn insert_batch(&self, triples: Vec<Triple>) -> StoreResult<()> {
        for t in &triples {
            let errors = validate_triple(t);
            if !errors.is_empty() {
                return Err(StoreError::Validation(errors));
            }
        }
        let mut guard = self.inner.write();
        for t in triples {
            Self::insert_locked(&mut guard, t);
        }
        Ok(())
    }

    fn insert_unchecked(&self, triple: Triple) {
        let mut guard = self.inner.write();
        Self::insert_locked(&mut guard, triple);
    }

    fn insert_locked(inner: &mut Inner, triple: Triple) {
        inner
            .predicate_index
            .entry(triple.predicate.clone())
            .or_default()
            .insert(triple.subject.clone());
        let versions = inner.rows.entry(triple.subject.clone()).or_default().entry(triple.predicate.clone()).or_default();
        let pos = versions
            .binary_search_by(|existing| cmp_version(existing, &triple))
            .unwrap_or_else(|i| i);
        versions.insert(pos, triple);
    }

    /// Latest non-tombstone triple for `(subject, predicate)`, or `None`
    /// if absent or the latest write is a tombstone.
    pub fn get(&self, subject: &EntityId, predicate: &Predicate) -> Option<Triple> {
        let guard = self.inner.read();
        let latest = guard.rows.get(subject)?.get(predicate)?.last()?;
        if latest.is_tombstone() {
            None
        } else {
            Some(latest.clone())
        }
    }

    /// Every predicate's latest non-tombstone triple for `subject`.
    pub fn get_subject(&self, subject: &EntityId) -> Vec<Triple> {
        let guard = self.inner.read();
        let Some(predicates) = guard.rows.get(subject) else { return Vec::new() };
        predicates
            .values()
            .filter_map(|versions| versions.last())
            .filter(|t| !t.is_tombstone())
            .cloned()
            .collect()
    }

    /// Batched `get_subject` over many subjects in one lock acquisition,
    /// so callers never need an N+1 loop of individual calls.
    pub fn get_multi_subjects(&self, subjects: &[EntityId]) -> HashMap<EntityId, Vec<Triple>> {
        let guard = self.inner.read();
        let mut out = HashMap::with_capacity(subjects.len());
        for subject in subjects {
            let rows = guard
                .rows
                .get(subject)
                .map(|predicates| {
                    predicates.values().filter_map(|v| v.last()).filter(|t| !t.is_tombstone()).cloned().collect()
                })
                .unwrap_or_default();
            out.insert(subject.clone(), rows);
        }
        out
    }

    /// Latest triple per subject for every subject that has ever had a
    /// value for `predicate` (including ones now tombstoned, which are
    /// filtered here since they carry no live value).
    pub fn get_by_predicate(&self, predicate: &Predicate) -> Vec<(EntityId, Triple)> {
        let guard = self.inner.read();
        let Some(subjects) = guard.predicate_index.get(predicate) else { return Vec::new() };
        subjects
            .iter()
            .filter_map(|subject| {
                let latest = guard.rows.get(subject)?.get(predicate)?.last()?;
                if latest.is_tombstone() {
                    None
                } else {
                    Some((subject.clone(), latest.clone()))
                }
            })
            .collect()
    }

    /// Inserts a new triple at `max(now_ms, latest_ts + 1)`, preserving
    /// the "writes within a shard are strictly ordered" invariant even if
    /// the wall clock hasn't advanced since the previous write.
    pub fn update(
        &self,
        subject: EntityId,
        predicate: Predicate,
        value: TypedValue,
        tx_id: edgegraph_types::TransactionId,
        now_ms: u64,
    ) -> StoreResult<Triple> {
        let timestamp = self.next_timestamp(&subject, &predicate, now_ms);
        let triple = Triple { subject, predicate, object: value, timestamp, tx_id };
        let errors = validate_triple(&triple);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        self.insert_unchecked(triple.clone());
        Ok(triple)
    }

    pub fn delete(
        &self,
        subject: EntityId,
        predicate: Predicate,
        tx_id: edgegraph_types::TransactionId,
        now_ms: u64,
    ) -> Triple {
        let timestamp = self.next_timestamp(&subject, &predicate, now_ms);
        let triple = Triple { subject, predicate, object: TypedValue::Null, timestamp, tx_id };
        self.insert_unchecked(triple.clone());
        triple
    }

    /// Tombstones every predicate currently live for `subject`.
    pub fn delete_entity(&self, subject: &EntityId, tx_id: edgegraph_types::TransactionId, now_ms: u64) -> Vec<Triple> {
        let live: Vec<Predicate> = {
            let guard = self.inner.read();
            guard
                .rows
                .get(subject)
                .map(|predicates| {
                    predicates
                        .iter()
                        .filter(|(_, versions)| versions.last().map(|t| !t.is_tombstone()).unwrap_or(false))
                        .map(|(p, _)| p.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        live.into_iter().map(|predicate| self.delete(subject.clone(), predicate, tx_id.clone(), now_ms)).collect()
    }

    pub fn exists(&self, subject: &EntityId) -> bool {
        let guard = self.inner.read();
        guard
            .rows
            .get(subject)
            .map(|predicates| predicates.values().any(|versions| versions.last().map(|t| !t.is_tombstone()).unwrap_or(false)))
            .unwrap_or(false)
    }

    fn next_timestamp(&self, subject: &EntityId, predicate: &Predicate, now_ms: u64) -> u64 {
        let guard = self.inner.read();
        let latest_ts = guard.rows.get(subject).and_then(|p| p.get(predicate)).and_then(|v| v.last()).map(|t| t.timestamp);
        match latest_ts {
            Some(prev) => now_ms.max(prev + 1),
            None => now_ms,
        }
    }

    /// All subjects currently tracked, for compaction range scans.
    pub fn all_subjects(&self) -> Vec<EntityId> {
        self.inner.read().rows.keys().cloned().collect()
    }

    /// Removes a subject's row entirely, used after compaction migrates
    /// its triples into a chunk.
    pub fn prune_subject(&self, subject: &EntityId) {
        let mut guard = self.inner.write();
        guard.rows.remove(subject);
        for subjects in guard.predicate_index.values_mut() {
            subjects.remove(subject);
        }
    }

    /// Serializes every row version for snapshotting (used by the writer's
    /// checkpoint, not by normal operation).
    pub fn snapshot(&self) -> Vec<u8> {
        let guard = self.inner.read();
        let mut rows: Vec<StoredRow> = Vec::new();
        for predicates in guard.rows.values() {
            for versions in predicates.values() {
                rows.extend(versions.iter().map(StoredRow::from));
            }
        }
        borsh::to_vec(&rows).expect("in-memory rows always serialize")
    }

    pub fn restore(&self, bytes: &[u8]) -> StoreResult<()> {
        let rows: Vec<StoredRow> = borsh::from_slice(bytes).map_err(|e| StoreError::RowParse {
            column: "snapshot",
            detail: e.to_string(),
        })?;
        let mut guard = self.inner.write();
        *guard = Inner::default();
        for row in rows {
            let triple = row.into_triple()?;
            Self::insert_locked(&mut guard, triple);
        }
        Ok(())
    }
}

impl Default for RowTable {
    fn default() -> Self {
        Self::new()
    }
}

fn cmp_version(a: &Triple, b: &Triple) -> std::cmp::Ordering {
    (a.timestamp, a.tx_id.as_str()).cmp(&(b.timestamp, b.tx_id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegraph_types::TxIdGenerator;

    fn triple(subject: &str, predicate: &str, object: TypedValue, ts: u64, gen: &TxIdGenerator) -> Triple {
        Triple {
            subject: EntityId::parse(subject.to_string()).unwrap(),
            predicate: Predicate::parse(predicate.to_string()).unwrap(),
            object,
            timestamp: ts,
            tx_id: gen.next(ts),
        }
    }

    #[test]
    fn get_returns_latest_non_tombstone() {
        let table = RowTable::new();
        let gen = TxIdGenerator::new();
        table.insert(triple("https://ex.com/e1", "name", TypedValue::String("a".into()), 1, &gen)).unwrap();
        table.insert(triple("https://ex.com/e1", "name", TypedValue::String("b".into()), 2, &gen)).unwrap();
        let got = table.get(&EntityId::parse("https://ex.com/e1").unwrap(), &Predicate::parse("name").unwrap()).unwrap();
        assert_eq!(got.object, TypedValue::String("b".into()));
    }

    #[test]
    fn tombstone_hides_value() {
        let table = RowTable::new();
        let gen = TxIdGenerator::new();
        let subject = EntityId::parse("https://ex.com/e1").unwrap();
        let predicate = Predicate::parse("name").unwrap();
        table.insert(triple("https://ex.com/e1", "name", TypedValue::String("a".into()), 1, &gen)).unwrap();
        table.delete(subject.clone(), predicate.clone(), gen.next(2), 2);
        assert!(table.get(&subject, &predicate).is_none());
    }

    #[test]
    fn update_assigns_monotonic_timestamp() {
        let table = RowTable::new();
        let gen = TxIdGenerator::new();
        let subject = EntityId::parse("https://ex.com/e1").unwrap();
        let predicate = Predicate::parse("name").unwrap();
        table.update(subject.clone(), predicate.clone(), TypedValue::String("a".into()), gen.next(5), 5).unwrap();
        let second = table.update(subject.clone(), predicate.clone(), TypedValue::String("b".into()), gen.next(5), 5).unwrap();
        assert!(second.timestamp > 5);
    }

    #[test]
    fn get_multi_subjects_batches_lookup() {
        let table = RowTable::new();
        let gen = TxIdGenerator::new();
        table.insert(triple("https://ex.com/e1", "name", TypedValue::String("a".into()), 1, &gen)).unwrap();
        table.insert(triple("https://ex.com/e2", "name", TypedValue::String("b".into()), 1, &gen)).unwrap();
        let e1 = EntityId::parse("https://ex.com/e1").unwrap();
        let e2 = EntityId::parse("https://ex.com/e2").unwrap();
        let result = table.get_multi_subjects(&[e1.clone(), e2.clone()]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[&e1].len(), 1);
        assert_eq!(result[&e2].len(), 1);
    }

    #[test]
    fn delete_entity_tombstones_all_live_predicates() {
        let table = RowTable::new();
        let gen = TxIdGenerator::new();
        let subject = EntityId::parse("https://ex.com/e1").unwrap();
        table.insert(triple("https://ex.com/e1", "name", TypedValue::String("a".into()), 1, &gen)).unwrap();
        table.insert(triple("https://ex.com/e1", "age", TypedValue::Int32(30), 1, &gen)).unwrap();
        table.delete_entity(&subject, gen.next(2), 2);
        assert!(!table.exists(&subject));
    }

    #[test]
    fn snapshot_round_trips() {
        let table = RowTable::new();
        let gen = TxIdGenerator::new();
        table.insert(triple("https://ex.com/e1", "name", TypedValue::String("a".into()), 1, &gen)).unwrap();
        let bytes = table.snapshot();
        let restored = RowTable::new();
        restored.restore(&bytes).unwrap();
        let subject = EntityId::parse("https://ex.com/e1").unwrap();
        assert!(restored.exists(&subject));
    }

    #[test]
    fn insert_batch_is_all_or_nothing() {
        let table = RowTable::new();
        let gen = TxIdGenerator::new();
        let good = triple("https://ex.com/e1", "name", TypedValue::String("a".into()), 1, &gen);
        let bad = Triple {
            subject: EntityId::parse("https://ex.com/e2").unwrap(),
            predicate: Predicate::parse("name").unwrap(),
            object: TypedValue::Float64(f64::INFINITY),
            timestamp: 1,
            tx_id: gen.next(1),
        };
        assert!(table.insert_batch(vec![good, bad]).is_err());
        assert!(!table.exists(&EntityId::parse("https://ex.com/e1").unwrap()));
    }
}
