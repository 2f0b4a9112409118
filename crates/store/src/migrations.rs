//! Versioned schema migrations (spec §6), grounded on the teacher's
//! version-gated migration table: a list of migration steps keyed by the
//! version they transition *to*, run in order until the table reports
//! `SCHEMA_VERSION`.

use crate::error::{StoreError, StoreResult};
use crate::row_table::RowTable;

/// The schema version this build of the store expects. Bump alongside a
/// new entry in [`MIGRATIONS`] whenever the row/meta layout changes.
pub const SCHEMA_VERSION: u32 = 1;

type MigrationFn = fn(&RowTable) -> StoreResult<()>;

/// One entry per version transition; `MIGRATIONS[i]` migrates from
/// version `i` to version `i + 1`. Version 1 has no predecessor, so the
/// table starts empty — the first real migration (version 1 -> 2) would
/// be pushed here alongside bumping `SCHEMA_VERSION`.
const MIGRATIONS: &[MigrationFn] = &[];

/// Applies every migration between `current_version` and
/// [`SCHEMA_VERSION`] in order. A no-op if already current.
pub fn migrate_to_version(table: &RowTable, current_version: u32) -> StoreResult<u32> {
    if current_version > SCHEMA_VERSION {
        return Err(StoreError::NoMigrationPath { from: current_version, to: SCHEMA_VERSION });
    }
    let start = (current_version as usize).min(MIGRATIONS.len());
    for step in &MIGRATIONS[start..] {
        step(table)?;
    }
    Ok(SCHEMA_VERSION)
}
