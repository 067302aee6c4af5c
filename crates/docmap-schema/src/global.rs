//! The process-wide registry.
//!
//! Install once, after registration and before first use. Later reads see a
//! registry that can no longer change.

use std::sync::OnceLock;

use crate::error::{SchemaError, SchemaResult};
use crate::registry::Registry;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Install `registry` for the whole process.
pub fn install(registry: Registry) -> SchemaResult<&'static Registry> {
    REGISTRY
        .set(registry)
        .map_err(|_| SchemaError::RegistryAlreadyInstalled)?;
    registry_ref()
}

/// The installed registry.
pub fn registry() -> SchemaResult<&'static Registry> {
    registry_ref()
}

fn registry_ref() -> SchemaResult<&'static Registry> {
    REGISTRY.get().ok_or(SchemaError::RegistryNotInstalled)
}
