//! Module file loading.
//!
//! Compiled modules arrive either as JSON (readable, used by tooling and
//! tests) or as bincode (compact, what the compiler ships). Both decode into
//! the same [`ModuleDefinition`] and are linked by [`Module::new`].

use std::fs;
use std::path::Path;

use log::info;

use crate::errors::ModuleError;

use super::{Module, ModuleDefinition};

pub fn from_json_str(text: &str) -> Result<Module, ModuleError> {
    let definition: ModuleDefinition = serde_json::from_str(text)?;
    Module::new(definition)
}

pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Module, ModuleError> {
    let contents = fs::read_to_string(path.as_ref())?;
    from_json_str(&contents)
}

pub fn from_bincode(bytes: &[u8]) -> Result<Module, ModuleError> {
    let definition: ModuleDefinition = bincode::deserialize(bytes)?;
    Module::new(definition)
}

pub fn from_bincode_file<P: AsRef<Path>>(path: P) -> Result<Module, ModuleError> {
    let bytes = fs::read(path.as_ref())?;
    from_bincode(&bytes)
}

/// Load a module, choosing the decoder by file extension (`.json` is JSON,
/// anything else bincode).
pub fn load<P: AsRef<Path>>(path: P) -> Result<Module, ModuleError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let module = if is_json {
        from_json_file(path)?
    } else {
        from_bincode_file(path)?
    };
    info!(
        "loaded module '{}' from {} ({} elements)",
        module.title(),
        path.display(),
        module.len()
    );
    Ok(module)
}

pub fn to_bincode(definition: &ModuleDefinition) -> Result<Vec<u8>, ModuleError> {
    Ok(bincode::serialize(definition)?)
}

pub fn write_bincode_file<P: AsRef<Path>>(
    definition: &ModuleDefinition,
    path: P,
) -> Result<(), ModuleError> {
    fs::write(path.as_ref(), to_bincode(definition)?)?;
    Ok(())
}

pub fn to_json_pretty(definition: &ModuleDefinition) -> Result<String, ModuleError> {
    Ok(serde_json::to_string_pretty(definition)?)
}
