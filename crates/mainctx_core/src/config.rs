//! Context/store configuration.
//!
//! # Responsibility
//! - Carry the store location, schema resource and runtime policy flags a
//!   host application injects when opening a context.
//!
//! # Invariants
//! - Destructive reset stays disabled unless the host opts in at runtime.
//! - Configuration is validated before any file or connection is touched.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the backing store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// SQLite file owned by the host application.
    OnDisk(PathBuf),
    /// In-memory store; used by tests and the smoke CLI.
    InMemory,
}

/// Configuration errors reported before any store is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyStorePath,
    EmptySchemaResource,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStorePath => write!(f, "store path cannot be empty"),
            Self::EmptySchemaResource => write!(f, "schema resource cannot be empty"),
        }
    }
}

impl Error for ConfigError {}

/// Host-injected configuration for one main-thread context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    location: StoreLocation,
    schema_json: String,
    busy_timeout: Duration,
    destructive_reset: bool,
}

impl StoreConfig {
    /// Configures a file-backed store at `path` with the given JSON schema
    /// resource.
    pub fn on_disk(path: impl Into<PathBuf>, schema_json: impl Into<String>) -> Self {
        Self {
            location: StoreLocation::OnDisk(path.into()),
            schema_json: schema_json.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            destructive_reset: false,
        }
    }

    /// Configures an in-memory store with the given JSON schema resource.
    pub fn in_memory(schema_json: impl Into<String>) -> Self {
        Self {
            location: StoreLocation::InMemory,
            schema_json: schema_json.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            destructive_reset: false,
        }
    }

    /// Opts in to `delete_store_file_and_recreate_store`.
    ///
    /// Left disabled, the reset operation is a logged no-op. Hosts enable
    /// this only for test/staging configurations.
    pub fn with_destructive_reset(mut self, allowed: bool) -> Self {
        self.destructive_reset = allowed;
        self
    }

    /// Overrides the SQLite busy timeout applied on open.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Checks the configuration before it is used to open anything.
    ///
    /// # Errors
    /// - `EmptyStorePath` for an on-disk location with an empty path.
    /// - `EmptySchemaResource` when the schema resource is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let StoreLocation::OnDisk(path) = &self.location {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyStorePath);
            }
        }
        if self.schema_json.trim().is_empty() {
            return Err(ConfigError::EmptySchemaResource);
        }
        Ok(())
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Returns the on-disk path, or `None` for in-memory stores.
    pub fn store_path(&self) -> Option<&Path> {
        match &self.location {
            StoreLocation::OnDisk(path) => Some(path.as_path()),
            StoreLocation::InMemory => None,
        }
    }

    pub fn schema_json(&self) -> &str {
        &self.schema_json
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    pub fn destructive_reset_allowed(&self) -> bool {
        self.destructive_reset
    }
}
