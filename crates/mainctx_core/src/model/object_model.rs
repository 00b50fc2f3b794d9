//! Object model loaded from a JSON schema resource.
//!
//! # Responsibility
//! - Parse and validate the schema resource exactly once.
//! - Answer entity/attribute lookups for context and store layers.
//!
//! # Invariants
//! - The model never changes after a successful load.
//! - Entity and attribute names are identifier-safe (they become table and
//!   column names in the backing store).
//! - `id` is reserved and cannot appear as an attribute name.

use crate::model::record::ManagedRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage kind of one entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Text,
    Integer,
    Real,
    Boolean,
}

impl AttributeKind {
    /// Human-readable kind name used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
        }
    }
}

impl Display for AttributeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity type described by the object model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescription {
    /// Entity name; doubles as the table-name suffix in the store.
    pub name: String,
    /// Declared attributes. Attributes absent from a record are stored as
    /// NULL, so every attribute is optional at the record level.
    pub attributes: BTreeMap<String, AttributeKind>,
}

/// Schema load/validation errors.
#[derive(Debug)]
pub enum ModelError {
    Parse(serde_json::Error),
    ZeroVersion,
    NoEntities,
    DuplicateEntity(String),
    InvalidEntityName(String),
    InvalidAttributeName { entity: String, attribute: String },
    ReservedAttributeName { entity: String, attribute: String },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "schema resource is not valid JSON: {err}"),
            Self::ZeroVersion => write!(f, "schema version must be >= 1"),
            Self::NoEntities => write!(f, "schema must declare at least one entity"),
            Self::DuplicateEntity(name) => write!(f, "entity declared twice: {name}"),
            Self::InvalidEntityName(name) => write!(f, "entity name is not identifier-safe: {name}"),
            Self::InvalidAttributeName { entity, attribute } => write!(
                f,
                "attribute name is not identifier-safe: {entity}.{attribute}"
            ),
            Self::ReservedAttributeName { entity, attribute } => {
                write!(f, "attribute name is reserved: {entity}.{attribute}")
            }
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Record-against-model validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    UnknownEntity(String),
    UnknownAttribute { entity: String, attribute: String },
    KindMismatch {
        entity: String,
        attribute: String,
        expected: AttributeKind,
        actual: AttributeKind,
    },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(name) => write!(f, "entity not in object model: {name}"),
            Self::UnknownAttribute { entity, attribute } => {
                write!(f, "attribute not in object model: {entity}.{attribute}")
            }
            Self::KindMismatch {
                entity,
                attribute,
                expected,
                actual,
            } => write!(
                f,
                "attribute kind mismatch for {entity}.{attribute}: expected {expected}, got {actual}"
            ),
        }
    }
}

impl Error for RecordValidationError {}

#[derive(Deserialize)]
struct RawModel {
    version: u32,
    entities: Vec<EntityDescription>,
}

/// The schema describing entity types and their attributes.
///
/// Loaded once from a JSON resource, immutable after load, shared by
/// reference (`Arc<ObjectModel>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectModel {
    version: u32,
    entities: BTreeMap<String, EntityDescription>,
}

impl ObjectModel {
    /// Parses and validates a JSON schema resource.
    ///
    /// Expected shape:
    /// `{"version": 1, "entities": [{"name": "note", "attributes": {"title": "text"}}]}`
    ///
    /// # Errors
    /// - `Parse` when the resource is not valid JSON of that shape.
    /// - Validation errors for version 0, empty entity list, duplicate
    ///   entities, unsafe names, or a reserved `id` attribute.
    pub fn from_json_str(resource: &str) -> Result<Self, ModelError> {
        let raw: RawModel = serde_json::from_str(resource)?;

        if raw.version == 0 {
            return Err(ModelError::ZeroVersion);
        }
        if raw.entities.is_empty() {
            return Err(ModelError::NoEntities);
        }

        let mut entities = BTreeMap::new();
        for entity in raw.entities {
            if !is_valid_identifier(&entity.name) {
                return Err(ModelError::InvalidEntityName(entity.name));
            }
            for attribute in entity.attributes.keys() {
                if attribute == "id" {
                    return Err(ModelError::ReservedAttributeName {
                        entity: entity.name.clone(),
                        attribute: attribute.clone(),
                    });
                }
                if !is_valid_identifier(attribute) {
                    return Err(ModelError::InvalidAttributeName {
                        entity: entity.name.clone(),
                        attribute: attribute.clone(),
                    });
                }
            }
            if entities.insert(entity.name.clone(), entity.clone()).is_some() {
                return Err(ModelError::DuplicateEntity(entity.name));
            }
        }

        Ok(Self {
            version: raw.version,
            entities,
        })
    }

    /// Returns the schema version declared by the resource.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns one entity description by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
        self.entities.get(name)
    }

    /// Iterates entity descriptions in name order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDescription> {
        self.entities.values()
    }

    /// Validates one record against this model.
    ///
    /// # Errors
    /// - `UnknownEntity` when the record's entity is not declared.
    /// - `UnknownAttribute` for attributes outside the entity description.
    /// - `KindMismatch` when a value's kind differs from the declaration.
    pub fn validate_record(&self, record: &ManagedRecord) -> Result<(), RecordValidationError> {
        let entity = self
            .entity(&record.entity)
            .ok_or_else(|| RecordValidationError::UnknownEntity(record.entity.clone()))?;

        for (name, value) in &record.attributes {
            let expected = entity.attributes.get(name).copied().ok_or_else(|| {
                RecordValidationError::UnknownAttribute {
                    entity: record.entity.clone(),
                    attribute: name.clone(),
                }
            })?;
            let actual = value.kind();
            if expected != actual {
                return Err(RecordValidationError::KindMismatch {
                    entity: record.entity.clone(),
                    attribute: name.clone(),
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }
}

fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
