// Schema loader.
//
// Purpose
// - Turn a schema file into a validated TableDefinition.
//
// Responsibilities
// - Tell an unreadable file apart from malformed content.
// - Parse as a pure function of the file's bytes; nothing else is read or changed.

use crate::modules::conditional_writes::core::table_definition::TableDefinition;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema {} is unreadable: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema {} is malformed: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

pub fn parse(path: &Path, bytes: &[u8]) -> Result<TableDefinition, SchemaError> {
    let malformed = |reason: String| SchemaError::Malformed {
        path: path.to_path_buf(),
        reason,
    };
    let definition: TableDefinition =
        serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
    definition.validate().map_err(malformed)?;
    Ok(definition)
}

pub async fn load(path: impl AsRef<Path>) -> Result<TableDefinition, SchemaError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| SchemaError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let definition = parse(path, &bytes)?;
    tracing::debug!(
        path = %path.display(),
        keys = definition.key_schema.len(),
        attributes = definition.attribute_definitions.len(),
        "schema loaded"
    );
    Ok(definition)
}
