//! Object model and managed record types.
//!
//! # Responsibility
//! - Define the schema (`ObjectModel`) loaded once from a resource.
//! - Define the in-memory managed record shape shared by context and store.
//!
//! # Invariants
//! - An `ObjectModel` is immutable after load and shared by reference.
//! - Every managed record is identified by a stable `ObjectId`.

pub mod object_model;
pub mod record;

pub use object_model::{
    AttributeKind, EntityDescription, ModelError, ObjectModel, RecordValidationError,
};
pub use record::{AttributeValue, ManagedRecord, ObjectId, ObjectRef};
