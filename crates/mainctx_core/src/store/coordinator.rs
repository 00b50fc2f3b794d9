//! Store coordinator: one connection binding the model to a backing store.
//!
//! # Responsibility
//! - Open file or in-memory SQLite stores for the bound object model.
//! - Configure connection pragmas and bootstrap the schema before use.
//! - Apply save batches atomically; serve record fetches.
//!
//! # Invariants
//! - Returned coordinators have `foreign_keys=ON` and a bootstrapped schema.
//! - `apply` commits all of a batch or none of it.

use crate::config::{StoreConfig, StoreLocation};
use crate::model::{AttributeKind, AttributeValue, EntityDescription, ManagedRecord, ObjectId, ObjectModel, ObjectRef};
use crate::store::schema::{create_schema, store_version, table_name, verify_schema};
use crate::store::{StoreError, StoreResult};
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One atomic unit of work for `StoreCoordinator::apply`.
///
/// Inserted and updated records are indistinguishable at the store level:
/// both become upserts keyed by stable ID.
#[derive(Debug, Clone, Default)]
pub struct SaveBatch {
    pub upserts: Vec<ManagedRecord>,
    pub deletes: Vec<ObjectRef>,
}

impl SaveBatch {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Binds an object model to a concrete backing store.
///
/// Created once per context; owns the on-disk store reference for its whole
/// lifetime (the destructive reset swaps the connection in place).
#[derive(Debug)]
pub struct StoreCoordinator {
    model: Arc<ObjectModel>,
    conn: Connection,
    location: StoreLocation,
    busy_timeout: Duration,
}

impl StoreCoordinator {
    /// Opens the backing store described by `config` and bootstraps it for
    /// the given model.
    ///
    /// # Side effects
    /// - Creates the store file and entity tables when absent.
    /// - Emits `store_open` logging events with duration and status.
    ///
    /// # Errors
    /// - `UnsupportedSchemaVersion` when the store was written by a newer
    ///   model.
    /// - `MissingEntityTable`/`MissingAttributeColumn` when an existing
    ///   store does not match the model shape (migration is out of scope).
    pub fn open(model: Arc<ObjectModel>, config: &StoreConfig) -> StoreResult<Self> {
        let started_at = Instant::now();
        let mode = location_mode(config.location());
        info!("event=store_open module=store status=start mode={mode}");

        let mut conn = match open_connection(config.location()) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=store_open module=store status=error mode={mode} duration_ms={} error_code=store_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        match bootstrap_connection(&mut conn, &model, config.busy_timeout()) {
            Ok(()) => {
                info!(
                    "event=store_open module=store status=ok mode={mode} schema_version={} duration_ms={}",
                    model.version(),
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    model,
                    conn,
                    location: config.location().clone(),
                    busy_timeout: config.busy_timeout(),
                })
            }
            Err(err) => {
                error!(
                    "event=store_open module=store status=error mode={mode} duration_ms={} error_code=store_bootstrap_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Returns the bound object model.
    pub fn model(&self) -> &Arc<ObjectModel> {
        &self.model
    }

    /// Returns the store file path, or `None` for in-memory stores.
    pub fn store_path(&self) -> Option<&Path> {
        match &self.location {
            StoreLocation::OnDisk(path) => Some(path.as_path()),
            StoreLocation::InMemory => None,
        }
    }

    /// Fetches one persisted record by entity and stable ID.
    pub fn fetch_record(&self, entity: &str, id: ObjectId) -> StoreResult<Option<ManagedRecord>> {
        let description = self.entity_description(entity)?;
        let sql = format!(
            "{} WHERE id = ?1;",
            select_sql(description)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(record_from_row(description, row)?));
        }
        Ok(None)
    }

    /// Fetches all persisted records of one entity, ordered by ID.
    pub fn fetch_entity(&self, entity: &str) -> StoreResult<Vec<ManagedRecord>> {
        let description = self.entity_description(entity)?;
        let sql = format!("{} ORDER BY id ASC;", select_sql(description));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(record_from_row(description, row)?);
        }
        Ok(records)
    }

    /// Counts persisted records of one entity.
    pub fn count_records(&self, entity: &str) -> StoreResult<u64> {
        let description = self.entity_description(entity)?;
        let count: u64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", table_name(&description.name)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Applies one save batch inside a single transaction.
    pub fn apply(&mut self, batch: &SaveBatch) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        for record in &batch.upserts {
            let description = self
                .model
                .entity(&record.entity)
                .ok_or_else(|| StoreError::UnknownEntity(record.entity.clone()))?;
            let (sql, values) = upsert_statement(description, record);
            tx.execute(&sql, params_from_iter(values))?;
        }

        for reference in &batch.deletes {
            let description = self
                .model
                .entity(&reference.entity)
                .ok_or_else(|| StoreError::UnknownEntity(reference.entity.clone()))?;
            tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1;", table_name(&description.name)),
                [reference.id.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Removes the backing store and recreates a fresh, empty one.
    ///
    /// For on-disk stores the store file and its `-wal`/`-shm` sidecars are
    /// deleted; for in-memory stores a new empty connection replaces the old
    /// one. Policy gating lives in the context, not here.
    pub fn destroy_and_recreate(&mut self) -> StoreResult<()> {
        let started_at = Instant::now();
        let mode = location_mode(&self.location);

        if let StoreLocation::OnDisk(path) = self.location.clone() {
            // A throwaway in-memory connection keeps `conn` valid while the
            // old handle closes and the store file is removed.
            let placeholder = Connection::open_in_memory()?;
            let old = std::mem::replace(&mut self.conn, placeholder);
            drop(old);
            remove_store_files(&path)?;
        }

        let mut conn = open_connection(&self.location)?;
        bootstrap_connection(&mut conn, &self.model, self.busy_timeout)?;
        self.conn = conn;

        info!(
            "event=store_reset module=store status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn entity_description(&self, entity: &str) -> StoreResult<&EntityDescription> {
        self.model
            .entity(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))
    }
}

fn location_mode(location: &StoreLocation) -> &'static str {
    match location {
        StoreLocation::OnDisk(_) => "file",
        StoreLocation::InMemory => "memory",
    }
}

fn open_connection(location: &StoreLocation) -> rusqlite::Result<Connection> {
    match location {
        StoreLocation::OnDisk(path) => Connection::open(path),
        StoreLocation::InMemory => Connection::open_in_memory(),
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    model: &ObjectModel,
    busy_timeout: Duration,
) -> StoreResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;

    let current_version = store_version(conn)?;
    if current_version > model.version() {
        return Err(StoreError::UnsupportedSchemaVersion {
            store_version: current_version,
            model_version: model.version(),
        });
    }

    // A store already at the model version must have the model's shape; a
    // missing table there is corruption to report, not to recreate.
    if current_version < model.version() {
        create_schema(conn, model)?;
    }
    verify_schema(conn, model)?;
    Ok(())
}

fn select_sql(entity: &EntityDescription) -> String {
    let mut columns = String::from("id");
    for attribute in entity.attributes.keys() {
        columns.push_str(", ");
        columns.push_str(attribute);
    }
    format!("SELECT {columns} FROM {}", table_name(&entity.name))
}

fn upsert_statement(entity: &EntityDescription, record: &ManagedRecord) -> (String, Vec<Value>) {
    let table = table_name(&entity.name);
    let mut columns = String::from("id");
    let mut placeholders = String::from("?1");
    let mut assignments = String::new();
    let mut values: Vec<Value> = vec![Value::Text(record.id.to_string())];

    for (index, (attribute, _)) in entity.attributes.iter().enumerate() {
        columns.push_str(", ");
        columns.push_str(attribute);
        placeholders.push_str(&format!(", ?{}", index + 2));
        if !assignments.is_empty() {
            assignments.push_str(", ");
        }
        assignments.push_str(&format!("{attribute} = excluded.{attribute}"));
        values.push(attribute_to_value(record.get(attribute)));
    }

    let sql = if assignments.is_empty() {
        format!("INSERT INTO {table} (id) VALUES (?1) ON CONFLICT(id) DO NOTHING;")
    } else {
        format!(
            "INSERT INTO {table} ({columns}) VALUES ({placeholders}) \
             ON CONFLICT(id) DO UPDATE SET {assignments};"
        )
    };

    (sql, values)
}

fn attribute_to_value(value: Option<&AttributeValue>) -> Value {
    match value {
        Some(AttributeValue::Text(text)) => Value::Text(text.clone()),
        Some(AttributeValue::Integer(number)) => Value::Integer(*number),
        Some(AttributeValue::Real(number)) => Value::Real(*number),
        Some(AttributeValue::Boolean(flag)) => Value::Integer(i64::from(*flag)),
        None => Value::Null,
    }
}

fn record_from_row(entity: &EntityDescription, row: &Row<'_>) -> StoreResult<ManagedRecord> {
    let id_text: String = row.get(0)?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidPersistedData(format!(
            "invalid id value `{id_text}` in {}",
            table_name(&entity.name)
        ))
    })?;

    let mut record = ManagedRecord::with_id(entity.name.clone(), id);
    for (index, (attribute, kind)) in entity.attributes.iter().enumerate() {
        let column = index + 1;
        let value = match kind {
            AttributeKind::Text => row
                .get::<_, Option<String>>(column)?
                .map(AttributeValue::Text),
            AttributeKind::Integer => row
                .get::<_, Option<i64>>(column)?
                .map(AttributeValue::Integer),
            AttributeKind::Real => row
                .get::<_, Option<f64>>(column)?
                .map(AttributeValue::Real),
            AttributeKind::Boolean => match row.get::<_, Option<i64>>(column)? {
                None => None,
                Some(0) => Some(AttributeValue::Boolean(false)),
                Some(1) => Some(AttributeValue::Boolean(true)),
                Some(other) => {
                    return Err(StoreError::InvalidPersistedData(format!(
                        "invalid boolean value `{other}` in {}.{attribute}",
                        table_name(&entity.name)
                    )));
                }
            },
        };
        if let Some(value) = value {
            record.set(attribute.clone(), value);
        }
    }
    Ok(record)
}

fn remove_store_files(path: &Path) -> std::io::Result<()> {
    remove_file_if_exists(path)?;
    remove_file_if_exists(&sidecar_path(path, "-wal"))?;
    remove_file_if_exists(&sidecar_path(path, "-shm"))?;
    Ok(())
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
