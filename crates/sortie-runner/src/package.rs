//! Release metadata: the errands a package declares.
//!
//! ```json
//! {
//!   "name": "postgres",
//!   "version": "1.4.0",
//!   "errands": {
//!     "backup": { "script": "errands/backup.sh", "description": "Dump all databases" }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errand::ErrandDef;
use crate::error::PackageError;

/// Default metadata filename, looked up in the release root.
pub const RELEASE_METADATA_FILE: &str = "release.json";

/// Metadata of a released package version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    errands: BTreeMap<String, ErrandDef>,
}

impl ReleaseMetadata {
    /// Create metadata without errands.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            errands: BTreeMap::new(),
        }
    }

    /// Add an errand, keyed by its name.
    pub fn with_errand(mut self, errand: ErrandDef) -> Self {
        self.errands.insert(errand.name.clone(), errand);
        self
    }

    /// Parse and validate from a JSON string.
    ///
    /// Errand names come from the map keys. Errands with an empty script are
    /// rejected here rather than when they are run.
    pub fn from_json(json: &str) -> Result<Self, PackageError> {
        let mut metadata: ReleaseMetadata = serde_json::from_str(json)?;
        for (name, errand) in metadata.errands.iter_mut() {
            errand.name = name.clone();
            if errand.script.as_os_str().is_empty() {
                return Err(PackageError::InvalidErrand {
                    name: name.clone(),
                    reason: "script path is empty".to_string(),
                });
            }
        }
        Ok(metadata)
    }

    /// Load from a metadata file.
    pub fn load(path: &Path) -> Result<Self, PackageError> {
        let contents = std::fs::read_to_string(path).map_err(|e| PackageError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let metadata = Self::from_json(&contents)?;
        tracing::debug!(
            path = %path.display(),
            release = %metadata.name,
            version = %metadata.version,
            errands = metadata.errands.len(),
            "Loaded release metadata"
        );
        Ok(metadata)
    }

    /// Look up an errand by name.
    pub fn errand(&self, name: &str) -> Result<&ErrandDef, PackageError> {
        self.errands
            .get(name)
            .ok_or_else(|| PackageError::ErrandNotFound {
                name: name.to_string(),
                release: self.name.clone(),
            })
    }

    /// All errands in name order.
    pub fn errands(&self) -> impl Iterator<Item = &ErrandDef> {
        self.errands.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errand::Errand;

    const METADATA: &str = r#"{
        "name": "postgres",
        "version": "1.4.0",
        "errands": {
            "backup": { "script": "errands/backup.sh", "description": "Dump all databases" },
            "analyze": { "script": "errands/analyze.sh" }
        }
    }"#;

    #[test]
    fn test_parse_metadata() {
        let metadata = ReleaseMetadata::from_json(METADATA).unwrap();
        assert_eq!(metadata.name, "postgres");
        assert_eq!(metadata.version, "1.4.0");

        let backup = metadata.errand("backup").unwrap();
        assert_eq!(backup.name(), "backup");
        assert_eq!(backup.script(), Path::new("errands/backup.sh"));
        assert_eq!(backup.description, "Dump all databases");
    }

    #[test]
    fn test_errands_listed_in_name_order() {
        let metadata = ReleaseMetadata::from_json(METADATA).unwrap();
        let names: Vec<&str> = metadata.errands().map(|e| e.name()).collect();
        assert_eq!(names, vec!["analyze", "backup"]);
    }

    #[test]
    fn test_unknown_errand() {
        let metadata = ReleaseMetadata::from_json(METADATA).unwrap();
        let err = metadata.errand("restore").unwrap_err();
        assert!(matches!(err, PackageError::ErrandNotFound { ref name, .. } if name == "restore"));
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn test_empty_script_rejected_at_load() {
        let err = ReleaseMetadata::from_json(
            r#"{"name": "x", "version": "1", "errands": {"noop": {"script": ""}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PackageError::InvalidErrand { ref name, .. } if name == "noop"));
    }

    #[test]
    fn test_missing_errands_section() {
        let metadata = ReleaseMetadata::from_json(r#"{"name": "x", "version": "1"}"#).unwrap();
        assert_eq!(metadata.errands().count(), 0);
    }

    #[test]
    fn test_builder() {
        let metadata = ReleaseMetadata::new("app", "0.1.0")
            .with_errand(ErrandDef::new("smoke", "errands/smoke.sh"));
        assert!(metadata.errand("smoke").is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RELEASE_METADATA_FILE);
        std::fs::write(&path, METADATA).unwrap();

        let metadata = ReleaseMetadata::load(&path).unwrap();
        assert_eq!(metadata.errands().count(), 2);

        let err = ReleaseMetadata::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, PackageError::Read { .. }));
    }
}
