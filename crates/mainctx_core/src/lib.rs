//! Main-thread persistence context over a SQLite backing store.
//!
//! One caller-owned, clone-shared context handle per host application:
//! staged in-memory changes, explicit saves, change-notification merges
//! from other contexts, and a runtime-gated destructive store reset.

pub mod config;
pub mod context;
pub mod logging;
pub mod model;
pub mod notification;
pub mod store;

pub use config::{ConfigError, StoreConfig, StoreLocation};
pub use context::{ContextError, ContextResult, MainContext};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{
    AttributeKind, AttributeValue, EntityDescription, ManagedRecord, ModelError, ObjectId,
    ObjectModel, ObjectRef, RecordValidationError,
};
pub use notification::ChangeNotification;
pub use store::{StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
