//! In-memory managed record shape.
//!
//! # Responsibility
//! - Define the record value carried by the context scratchpad and the
//!   change notifications exchanged between contexts.
//!
//! # Invariants
//! - `id` is stable and never reused for another object.
//! - Attribute values must match the declared `AttributeKind` before any
//!   staging or persistence (enforced by `ObjectModel::validate_record`).

use crate::model::object_model::AttributeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every managed object.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type ObjectId = Uuid;

/// (entity, id) pair naming one object without carrying its attributes.
///
/// Used as the deletion payload in change notifications and as the context's
/// internal cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub entity: String,
    pub id: ObjectId,
}

impl ObjectRef {
    pub fn new(entity: impl Into<String>, id: ObjectId) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity, self.id)
    }
}

/// One attribute value, tagged with its storage kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

impl AttributeValue {
    /// Returns the declared kind this value satisfies.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::Text(_) => AttributeKind::Text,
            Self::Integer(_) => AttributeKind::Integer,
            Self::Real(_) => AttributeKind::Real,
            Self::Boolean(_) => AttributeKind::Boolean,
        }
    }
}

/// One in-memory managed object.
///
/// Attributes absent from the map are unset (NULL in the store); the model
/// treats every declared attribute as optional at the record level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedRecord {
    /// Entity name; must be declared by the object model.
    pub entity: String,
    /// Stable global ID used for identity, merge and deletion.
    pub id: ObjectId,
    /// Attribute values keyed by declared attribute name.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl ManagedRecord {
    /// Creates a record with a generated stable ID and no attributes set.
    pub fn new(entity: impl Into<String>) -> Self {
        Self::with_id(entity, Uuid::new_v4())
    }

    /// Creates a record with a caller-provided stable ID.
    ///
    /// Used by merge/import paths where identity already exists externally.
    pub fn with_id(entity: impl Into<String>, id: ObjectId) -> Self {
        Self {
            entity: entity.into(),
            id,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets one attribute value, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: AttributeValue) -> &mut Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Returns one attribute value by name.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Returns the (entity, id) reference naming this record.
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.entity.clone(), self.id)
    }
}
