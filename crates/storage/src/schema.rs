//! Schema bootstrap scripts
//!
//! The bundled script (`resources/create-all.sql`) creates the
//! `metadata_aspect` and `metadata_id` tables. Deployments may point at a
//! script on disk instead; a missing or unreadable file is a resource
//! initialization failure.

use std::path::PathBuf;

use aspectdb_core::{StoreError, StoreResult};

/// Name of the bundled schema resource
pub const BUNDLED_SCHEMA_NAME: &str = "create-all.sql";

/// Text of the bundled schema script
pub const BUNDLED_SCHEMA: &str = include_str!("../resources/create-all.sql");

/// Where a schema script comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchemaScript {
    /// The script compiled into this crate
    #[default]
    Bundled,
    /// A UTF-8 file read at construction time
    File(PathBuf),
}

impl SchemaScript {
    /// Read the script text
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ResourceInit` when the file cannot be read, is
    /// not UTF-8, or is empty.
    pub fn load(&self) -> StoreResult<String> {
        let text = match self {
            SchemaScript::Bundled => BUNDLED_SCHEMA.to_string(),
            SchemaScript::File(path) => std::fs::read_to_string(path).map_err(|e| {
                StoreError::resource_init(format!(
                    "failed to read schema script '{}': {}",
                    path.display(),
                    e
                ))
            })?,
        };

        if text.trim().is_empty() {
            return Err(StoreError::resource_init(format!(
                "schema script {} is empty",
                self.describe()
            )));
        }
        Ok(text)
    }

    /// Human-readable name for logs
    pub fn describe(&self) -> String {
        match self {
            SchemaScript::Bundled => format!("bundled:{}", BUNDLED_SCHEMA_NAME),
            SchemaScript::File(path) => path.display().to_string(),
        }
    }
}
