//! Schema DDL derived from the object model.
//!
//! # Responsibility
//! - Generate one table per entity and verify store shape on open.
//!
//! # Invariants
//! - Table/column names come only from model-validated identifiers.
//! - Verification rejects a wrong-shaped store instead of masking it.

use crate::model::{AttributeKind, EntityDescription, ObjectModel};
use crate::store::{StoreError, StoreResult};
use rusqlite::Connection;

/// Table name for one entity.
pub(super) fn table_name(entity: &str) -> String {
    format!("obj_{entity}")
}

fn column_type(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Text => "TEXT",
        AttributeKind::Integer => "INTEGER",
        AttributeKind::Real => "REAL",
        AttributeKind::Boolean => "INTEGER",
    }
}

fn create_table_sql(entity: &EntityDescription) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    id TEXT PRIMARY KEY NOT NULL",
        table_name(&entity.name)
    );
    for (attribute, kind) in &entity.attributes {
        sql.push_str(&format!(",\n    {attribute} {}", column_type(*kind)));
    }
    sql.push_str("\n);");
    sql
}

/// Creates all entity tables and mirrors the model version into
/// `PRAGMA user_version`, inside one transaction.
pub(super) fn create_schema(conn: &mut Connection, model: &ObjectModel) -> StoreResult<()> {
    let tx = conn.transaction()?;
    for entity in model.entities() {
        tx.execute_batch(&create_table_sql(entity))?;
    }
    tx.execute_batch(&format!("PRAGMA user_version = {};", model.version()))?;
    tx.commit()?;
    Ok(())
}

/// Verifies every entity table and attribute column exists.
///
/// Catches stores created by an older model (schema migration is out of
/// scope, so a shape mismatch is an error, not a repair).
pub(super) fn verify_schema(conn: &Connection, model: &ObjectModel) -> StoreResult<()> {
    for entity in model.entities() {
        let table = table_name(&entity.name);

        let table_count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [table.as_str()],
            |row| row.get(0),
        )?;
        if table_count == 0 {
            return Err(StoreError::MissingEntityTable(table));
        }

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
        let mut columns = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            columns.push(row.get::<_, String>("name")?);
        }

        for attribute in entity.attributes.keys() {
            if !columns.iter().any(|column| column == attribute) {
                return Err(StoreError::MissingAttributeColumn {
                    table,
                    column: attribute.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Reads the store schema version from `PRAGMA user_version`.
pub(super) fn store_version(conn: &Connection) -> StoreResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
