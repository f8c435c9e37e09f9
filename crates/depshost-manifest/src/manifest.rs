use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot open {} for reading: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parsed dependency manifest (`*.deps.json`).
///
/// Read-only after construction. A manifest that failed to parse is
/// represented by an empty document rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DepsDocument {
    root: Value,
}

impl Default for DepsDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl DepsDocument {
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        match &self.root {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }
}

/// Parse manifest text. Malformed input degrades to an empty document.
pub fn parse_deps_str(input: &str, origin: &Path) -> DepsDocument {
    match serde_json::from_str(input) {
        Ok(root) => DepsDocument::from_value(root),
        Err(e) => {
            warn!("failed to parse {}: {e}", origin.display());
            DepsDocument::empty()
        }
    }
}

/// Read and parse a manifest file. Only an unreadable file is an error.
pub fn load_deps_file(path: impl AsRef<Path>) -> Result<DepsDocument, ManifestError> {
    let path = path.as_ref();
    debug!("loading dependency manifest {}", path.display());
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_deps_str(&content, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.deps.json");
        fs::write(&path, r#"{"runtimeTarget": {"name": "net1.0"}}"#).unwrap();

        let doc = load_deps_file(&path).unwrap();
        assert!(!doc.is_empty());
        assert_eq!(doc.root()["runtimeTarget"]["name"], "net1.0");
    }

    #[test]
    fn missing_file_is_fatal_and_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.deps.json");

        let err = load_deps_file(&path).unwrap_err();
        assert!(err.to_string().contains("absent.deps.json"));
        assert!(err.to_string().starts_with("cannot open"));
    }

    #[test]
    fn malformed_manifest_yields_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.deps.json");
        fs::write(&path, "this is { not json").unwrap();

        let doc = load_deps_file(&path).unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc, DepsDocument::empty());
    }

    #[test]
    fn empty_file_yields_empty_document() {
        let doc = parse_deps_str("", Path::new("empty.deps.json"));
        assert!(doc.is_empty());
    }

    #[test]
    fn non_object_root_is_not_empty() {
        let doc = parse_deps_str("[1, 2]", Path::new("array.deps.json"));
        assert!(!doc.is_empty());
    }
}
