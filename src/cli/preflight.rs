//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials and the course catalog are available before
//! starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, SyllabusError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Asking questions needs the model provider key, the embedding key and
    /// the catalog.
    Ask,
    /// Direct search and outline lookups need the embedding key and the
    /// catalog.
    Retrieve,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask => {
            settings.generation.resolve_api_key()?;
            settings.generation.base_url()?;
            check_embedding_key()?;
            check_catalog(settings)?;
        }
        Operation::Retrieve => {
            check_embedding_key()?;
            check_catalog(settings)?;
        }
    }
    Ok(())
}

/// Check that the embedding provider key is configured.
pub fn check_embedding_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SyllabusError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(SyllabusError::Config(
            "OPENAI_API_KEY not set (needed for embeddings). Set it with: export OPENAI_API_KEY='sk-...'"
                .to_string(),
        )),
    }
}

/// Check that the catalog snapshot exists.
pub fn check_catalog(settings: &Settings) -> Result<()> {
    let path = settings.catalog_path();
    if path.is_file() {
        Ok(())
    } else {
        Err(SyllabusError::VectorStore(format!(
            "Course catalog not found at {}. Set vector_store.catalog_path in the config.",
            path.display()
        )))
    }
}
