//! Schema steps for the QuillNote database.
//!
//! # Responsibility
//! - List the schema steps the binary knows, oldest first.
//! - Bring a connection up to the newest step in one transaction.
//!
//! # Invariants
//! - Step versions start at 1 and grow by exactly one.
//! - After every step `PRAGMA user_version` equals that step's version.
//! - A database stamped newer than the newest step is never touched.
//!
//! # Schema
//! - v1 `kv`: key-value medium for note persistence.
//! - v2 `doc_updates`: offline cache of shared-document updates.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "kv",
        sql: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        name: "doc_updates",
        sql: include_str!("0002_doc_updates.sql"),
    },
];

/// Newest schema version this binary can write.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Version stamped on the database by the last applied step.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Runs every step newer than the database's stamp.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is newer than the binary.
/// - `Sqlite` when a step fails; the transaction is rolled back.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let to = latest_version();
    if from > to {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: to,
        });
    }

    let pending: Vec<&SchemaStep> = STEPS.iter().filter(|step| step.version > from).collect();
    if pending.is_empty() {
        return Ok(());
    }

    info!("event=db_migrate module=db status=start from_version={from} to_version={to}");
    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate module=db status=step version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;
    info!("event=db_migrate module=db status=ok version={to}");
    Ok(())
}
