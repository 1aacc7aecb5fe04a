//! Reading module documents and type catalogs from disk.

use anyhow::{Context, Result};
use modlink_core::{ModuleDocument, PermissiveCatalog, StaticCatalog, TypeCatalog};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Files ending in `.yaml` or `.yml` are YAML, everything else is JSON.
fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

pub(crate) fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("error reading file '{}'", path.display()))?;
    if is_yaml(path) {
        serde_yaml::from_str(&src)
            .with_context(|| format!("error parsing YAML in '{}'", path.display()))
    } else {
        serde_json::from_str(&src)
            .with_context(|| format!("error parsing JSON in '{}'", path.display()))
    }
}

pub(crate) fn read_document(path: &Path) -> Result<ModuleDocument> {
    let doc: ModuleDocument = read_structured(path)?;
    tracing::debug!(
        path = %path.display(),
        module = %doc.module,
        entities = doc.entities.len(),
        "loaded module document"
    );
    Ok(doc)
}

/// The catalog at `path`, or the permissive catalog when none is given.
pub(crate) fn read_catalog(path: Option<&Path>) -> Result<Box<dyn TypeCatalog>> {
    match path {
        Some(path) => {
            let catalog: StaticCatalog = read_structured(path)
                .with_context(|| format!("invalid type catalog '{}'", path.display()))?;
            Ok(Box::new(catalog))
        }
        None => Ok(Box::new(PermissiveCatalog)),
    }
}
