//! Main-thread persistence context.
//!
//! # Responsibility
//! - Hand out one shared context handle over model + store coordinator.
//! - Track staged changes in memory until an explicit save.
//! - Fold change notifications from other contexts into in-memory state.
//!
//! # Invariants
//! - Every clone of a `MainContext` observes the same context state.
//! - The handle is `!Send`, so all access stays on the creating thread; no
//!   internal locking or queueing exists.
//! - Staged changes reach the store only through `save`, in one transaction.

use crate::config::{ConfigError, StoreConfig};
use crate::model::{
    ManagedRecord, ModelError, ObjectId, ObjectModel, ObjectRef, RecordValidationError,
};
use crate::notification::ChangeNotification;
use crate::store::{SaveBatch, StoreCoordinator, StoreError};
use log::{error, info, warn};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

pub type ContextResult<T> = Result<T, ContextError>;

/// Context-level errors across config, model, staging and store layers.
#[derive(Debug)]
pub enum ContextError {
    Config(ConfigError),
    Model(ModelError),
    Validation(RecordValidationError),
    Store(StoreError),
    ObjectNotFound(ObjectRef),
    ObjectAlreadyExists(ObjectRef),
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Model(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::ObjectNotFound(reference) => write!(f, "object not found: {reference}"),
            Self::ObjectAlreadyExists(reference) => {
                write!(f, "object already exists: {reference}")
            }
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Model(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::ObjectNotFound(_) | Self::ObjectAlreadyExists(_) => None,
        }
    }
}

impl From<ConfigError> for ContextError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ModelError> for ContextError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<RecordValidationError> for ContextError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ContextError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug, Default)]
struct PendingChanges {
    inserted: BTreeSet<ObjectRef>,
    updated: BTreeSet<ObjectRef>,
    deleted: BTreeSet<ObjectRef>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    fn touches(&self, reference: &ObjectRef) -> bool {
        self.inserted.contains(reference)
            || self.updated.contains(reference)
            || self.deleted.contains(reference)
    }

    fn clear(&mut self) {
        self.inserted.clear();
        self.updated.clear();
        self.deleted.clear();
    }
}

#[derive(Debug)]
struct ContextInner {
    coordinator: StoreCoordinator,
    registered: BTreeMap<ObjectRef, ManagedRecord>,
    pending: PendingChanges,
    destructive_reset_allowed: bool,
}

/// Caller-owned handle to the shared main-thread context.
///
/// Created by the host via `MainContext::open` and passed by dependency
/// injection; cloning is cheap and every clone refers to the same context
/// (`same_context` observes identity). The handle is `!Send + !Sync`, which
/// pins all access to the creating thread at compile time.
#[derive(Clone, Debug)]
pub struct MainContext {
    inner: Rc<RefCell<ContextInner>>,
}

impl MainContext {
    /// Opens a context: loads the object model from the configured schema
    /// resource, binds the store coordinator to the backing store, then
    /// wires the context, in that dependency order.
    ///
    /// # Errors
    /// Propagates configuration, schema-parse and store open/bootstrap
    /// failures; no partially initialized context is ever returned.
    pub fn open(config: StoreConfig) -> ContextResult<Self> {
        config.validate()?;

        let model = Arc::new(ObjectModel::from_json_str(config.schema_json())?);
        let coordinator = StoreCoordinator::open(model, &config)?;

        info!(
            "event=context_open module=context status=ok destructive_reset={}",
            config.destructive_reset_allowed()
        );

        Ok(Self {
            inner: Rc::new(RefCell::new(ContextInner {
                coordinator,
                registered: BTreeMap::new(),
                pending: PendingChanges::default(),
                destructive_reset_allowed: config.destructive_reset_allowed(),
            })),
        })
    }

    /// Returns whether two handles refer to the same context.
    pub fn same_context(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the shared, immutable object model.
    pub fn object_model(&self) -> Arc<ObjectModel> {
        self.inner.borrow().coordinator.model().clone()
    }

    /// Returns the backing store file path, or `None` for in-memory stores.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.inner
            .borrow()
            .coordinator
            .store_path()
            .map(PathBuf::from)
    }

    /// Stages a brand-new object.
    ///
    /// The record exists only in the scratchpad until `save`.
    ///
    /// # Errors
    /// - Validation errors when the record does not fit the model.
    /// - `ObjectAlreadyExists` when the ID is already registered or
    ///   persisted (deleting first and re-inserting is allowed and becomes
    ///   an update).
    pub fn insert(&self, record: ManagedRecord) -> ContextResult<ObjectId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.coordinator.model().validate_record(&record)?;

        let reference = record.object_ref();
        let id = record.id;
        if inner.pending.deleted.remove(&reference) {
            inner.pending.updated.insert(reference.clone());
            inner.registered.insert(reference, record);
            return Ok(id);
        }

        if inner.registered.contains_key(&reference)
            || inner
                .coordinator
                .fetch_record(&reference.entity, reference.id)?
                .is_some()
        {
            return Err(ContextError::ObjectAlreadyExists(reference));
        }

        inner.pending.inserted.insert(reference.clone());
        inner.registered.insert(reference, record);
        Ok(id)
    }

    /// Stages new attribute state for an existing object.
    ///
    /// # Errors
    /// - Validation errors when the record does not fit the model.
    /// - `ObjectNotFound` when the object is neither staged, registered nor
    ///   persisted, or is staged for deletion.
    pub fn update(&self, record: ManagedRecord) -> ContextResult<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.coordinator.model().validate_record(&record)?;

        let reference = record.object_ref();
        if inner.pending.deleted.contains(&reference) {
            return Err(ContextError::ObjectNotFound(reference));
        }

        let known = inner.registered.contains_key(&reference)
            || inner
                .coordinator
                .fetch_record(&reference.entity, reference.id)?
                .is_some();
        if !known {
            return Err(ContextError::ObjectNotFound(reference));
        }

        if !inner.pending.inserted.contains(&reference) {
            inner.pending.updated.insert(reference.clone());
        }
        inner.registered.insert(reference, record);
        Ok(())
    }

    /// Stages deletion of one object. Idempotent for already-staged
    /// deletions; deleting a not-yet-saved insert cancels it outright.
    pub fn delete_object(&self, entity: &str, id: ObjectId) -> ContextResult<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        require_entity(inner.coordinator.model(), entity)?;

        let reference = ObjectRef::new(entity, id);
        if inner.pending.inserted.remove(&reference) {
            inner.registered.remove(&reference);
            return Ok(());
        }
        if inner.pending.deleted.contains(&reference) {
            return Ok(());
        }

        let known = inner.registered.contains_key(&reference)
            || inner.coordinator.fetch_record(entity, id)?.is_some();
        if !known {
            return Err(ContextError::ObjectNotFound(reference));
        }

        inner.pending.updated.remove(&reference);
        inner.registered.remove(&reference);
        inner.pending.deleted.insert(reference);
        Ok(())
    }

    /// Fetches one object, overlaying scratchpad state on the store.
    ///
    /// Staged deletions hide the object; registered (staged or merged)
    /// copies win over persisted rows. Freshly fetched rows are registered.
    pub fn fetch(&self, entity: &str, id: ObjectId) -> ContextResult<Option<ManagedRecord>> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        require_entity(inner.coordinator.model(), entity)?;

        let reference = ObjectRef::new(entity, id);
        if inner.pending.deleted.contains(&reference) {
            return Ok(None);
        }
        if let Some(record) = inner.registered.get(&reference) {
            return Ok(Some(record.clone()));
        }

        match inner.coordinator.fetch_record(entity, id)? {
            Some(record) => {
                inner.registered.insert(reference, record.clone());
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Fetches all objects of one entity with the scratchpad overlay
    /// applied, ordered by ID.
    pub fn fetch_all(&self, entity: &str) -> ContextResult<Vec<ManagedRecord>> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        require_entity(inner.coordinator.model(), entity)?;

        let mut merged: BTreeMap<ObjectRef, ManagedRecord> = BTreeMap::new();
        for record in inner.coordinator.fetch_entity(entity)? {
            merged.insert(record.object_ref(), record);
        }

        for (reference, record) in &inner.registered {
            if reference.entity == entity {
                merged.insert(reference.clone(), record.clone());
            }
        }
        for reference in &inner.pending.deleted {
            merged.remove(reference);
        }

        // Register persisted rows the scratchpad had not seen yet.
        for (reference, record) in &merged {
            inner
                .registered
                .entry(reference.clone())
                .or_insert_with(|| record.clone());
        }

        Ok(merged.into_values().collect())
    }

    /// Returns whether unsaved staged changes exist.
    pub fn has_pending_changes(&self) -> bool {
        !self.inner.borrow().pending.is_empty()
    }

    /// Number of staged object changes awaiting save.
    pub fn pending_change_count(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Persists all staged changes to the backing store in one transaction.
    ///
    /// Returns the change notification describing what was committed, ready
    /// to hand to other contexts' `merge_changes`. A save with nothing
    /// staged is a successful no-op with an empty notification.
    pub fn save(&self) -> ContextResult<ChangeNotification> {
        let started_at = Instant::now();
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        if inner.pending.is_empty() {
            return Ok(ChangeNotification::default());
        }

        let notification = build_notification(&inner.pending, &inner.registered)?;
        let batch = SaveBatch {
            upserts: notification
                .inserted
                .iter()
                .chain(notification.updated.iter())
                .cloned()
                .collect(),
            deletes: notification.deleted.clone(),
        };

        if let Err(err) = inner.coordinator.apply(&batch) {
            error!(
                "event=context_save module=context status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }

        inner.pending.clear();
        info!(
            "event=context_save module=context status=ok inserted={} updated={} deleted={} duration_ms={}",
            notification.inserted.len(),
            notification.updated.len(),
            notification.deleted.len(),
            started_at.elapsed().as_millis()
        );
        Ok(notification)
    }

    /// Folds an externally produced change notification into in-memory
    /// state, consumer-side only: the store is not touched and no save is
    /// required for the changes to become visible through fetches.
    ///
    /// Objects with locally staged (unsaved) changes are skipped so a merge
    /// never clobbers uncommitted edits. A notification that fails
    /// validation is rejected whole; nothing from it is applied.
    pub fn merge_changes(&self, notification: &ChangeNotification) -> ContextResult<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        // Validate the whole payload first: a bad notification is rejected
        // as a unit and leaves the context untouched.
        for record in notification.inserted.iter().chain(notification.updated.iter()) {
            inner.coordinator.model().validate_record(record)?;
        }
        for reference in &notification.deleted {
            require_entity(inner.coordinator.model(), &reference.entity)?;
        }

        let mut merged = 0usize;
        let mut skipped = 0usize;

        for record in notification.inserted.iter().chain(notification.updated.iter()) {
            let reference = record.object_ref();
            if inner.pending.touches(&reference) {
                skipped += 1;
                continue;
            }
            inner.registered.insert(reference, record.clone());
            merged += 1;
        }

        for reference in &notification.deleted {
            if inner.pending.touches(reference) {
                skipped += 1;
                continue;
            }
            inner.registered.remove(reference);
            merged += 1;
        }

        info!(
            "event=context_merge module=context status=ok merged={merged} skipped={skipped}"
        );
        Ok(())
    }

    /// Deletes the backing store file and recreates a fresh, empty store.
    ///
    /// Gated by the runtime `destructive_reset` flag in `StoreConfig`:
    /// disabled (the default), this call is a logged no-op and store
    /// contents are untouched. Enabled, the store file (plus `-wal`/`-shm`
    /// sidecars) is removed, an empty store is bootstrapped and all
    /// scratchpad state is dropped.
    pub fn delete_store_file_and_recreate_store(&self) -> ContextResult<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        if !inner.destructive_reset_allowed {
            warn!(
                "event=store_reset module=context status=skipped reason=destructive_reset_disabled"
            );
            return Ok(());
        }

        inner.coordinator.destroy_and_recreate()?;
        inner.registered.clear();
        inner.pending.clear();
        Ok(())
    }

    /// Counts persisted objects of one entity (scratchpad excluded).
    pub fn persisted_count(&self, entity: &str) -> ContextResult<u64> {
        let guard = self.inner.borrow();
        require_entity(guard.coordinator.model(), entity)?;
        Ok(guard.coordinator.count_records(entity)?)
    }
}

fn require_entity(model: &Arc<ObjectModel>, entity: &str) -> Result<(), RecordValidationError> {
    if model.entity(entity).is_none() {
        return Err(RecordValidationError::UnknownEntity(entity.to_string()));
    }
    Ok(())
}

fn build_notification(
    pending: &PendingChanges,
    registered: &BTreeMap<ObjectRef, ManagedRecord>,
) -> ContextResult<ChangeNotification> {
    let mut notification = ChangeNotification::default();

    for reference in &pending.inserted {
        let record = registered
            .get(reference)
            .ok_or_else(|| ContextError::ObjectNotFound(reference.clone()))?;
        notification.inserted.push(record.clone());
    }
    for reference in &pending.updated {
        let record = registered
            .get(reference)
            .ok_or_else(|| ContextError::ObjectNotFound(reference.clone()))?;
        notification.updated.push(record.clone());
    }
    notification.deleted = pending.deleted.iter().cloned().collect();

    Ok(notification)
}
