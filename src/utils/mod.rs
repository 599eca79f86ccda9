//! Utility functions and helpers

use serde::{Deserialize, Deserializer};

use crate::errors::{DsmError, Result};

/// Deserialize a value that DSM may send as `null`, falling back to `T::default()`.
pub fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Validates that a value can be used as a single filesystem path component.
///
/// Secret identities become directory names and data keys become file names,
/// so both are rejected when they are:
/// - Empty
/// - `.` or `..`
/// - Longer than 255 bytes
/// - Containing `/`, `\` or NUL
///
/// # Example
///
/// ```rust,ignore
/// validate_path_component("database", "identity")?; // OK
/// validate_path_component("../etc", "identity")?;   // Error: contains '/'
/// ```
pub fn validate_path_component(component: &str, component_name: &str) -> Result<()> {
    if component.is_empty() {
        return Err(DsmError::config_field(
            format!("{} cannot be empty", component_name),
            component_name,
        ));
    }

    if component == "." || component == ".." {
        return Err(DsmError::config_field(
            format!("{} cannot be '{}' (path traversal)", component_name, component),
            component_name,
        ));
    }

    if component.len() > 255 {
        return Err(DsmError::config_field(
            format!(
                "{} exceeds maximum length of 255 bytes (got {})",
                component_name,
                component.len()
            ),
            component_name,
        ));
    }

    if component.contains(['/', '\\', '\0']) {
        return Err(DsmError::config_field(
            format!("{} '{}' cannot contain a path separator", component_name, component),
            component_name,
        ));
    }

    Ok(())
}
