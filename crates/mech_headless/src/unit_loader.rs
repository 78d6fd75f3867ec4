//! Unit template loading for headless runs.
//!
//! The registry starts with the built-in standard templates and can be
//! extended with RON template files, so scenarios can field custom designs
//! without touching the core.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mech_core::data::{standard_templates, UnitTemplate};
use mech_core::unit::UnitDefinition;
use thiserror::Error;

/// Errors that can occur while loading unit templates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitLoadError {
    /// Failed to read a file or directory.
    #[error("IO error reading '{path}': {message}")]
    Io {
        /// Path being read.
        path: String,
        /// Error message.
        message: String,
    },
    /// A template failed to parse or build.
    #[error("Invalid template in '{path}': {message}")]
    Invalid {
        /// Path being read.
        path: String,
        /// Error message.
        message: String,
    },
    /// Directory not found.
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),
    /// No template with this id.
    #[error("Unknown unit template '{0}'")]
    UnknownTemplate(String),
}

/// Templates by model id.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, UnitTemplate>,
}

impl TemplateRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in standard templates.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for template in standard_templates() {
            registry.insert(template);
        }
        registry
    }

    /// Add or replace a template.
    pub fn insert(&mut self, template: UnitTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Load one RON template. It must also build, so bad designs are
    /// caught at load time rather than when a scenario fields them.
    pub fn load_from_file(&mut self, path: &Path) -> Result<String, UnitLoadError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| UnitLoadError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let template = UnitTemplate::from_ron_str(&display, &content)
            .and_then(|template| template.build().map(|_| template))
            .map_err(|e| UnitLoadError::Invalid {
                path: display,
                message: e.to_string(),
            })?;

        let id = template.id.clone();
        tracing::debug!(id = %id, path = %path.display(), "loaded unit template");
        self.insert(template);
        Ok(id)
    }

    /// Load every `.ron` file in a directory, in file name order.
    ///
    /// Files that fail are logged and skipped; the error list comes back
    /// alongside the ids that did load.
    pub fn load_from_directory(&mut self, dir: &Path) -> Result<(Vec<String>, Vec<UnitLoadError>), UnitLoadError> {
        if !dir.is_dir() {
            return Err(UnitLoadError::DirectoryNotFound(dir.display().to_string()));
        }
        let io = |e: std::io::Error| UnitLoadError::Io {
            path: dir.display().to_string(),
            message: e.to_string(),
        };

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir).map_err(io)? {
            let path = entry.map_err(io)?.path();
            if path.extension().map_or(false, |e| e == "ron") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = Vec::new();
        let mut failed = Vec::new();
        for path in paths {
            match self.load_from_file(&path) {
                Ok(id) => loaded.push(id),
                Err(e) => {
                    tracing::warn!("Failed to load unit template from {:?}: {}", path, e);
                    failed.push(e);
                }
            }
        }
        Ok((loaded, failed))
    }

    /// Template by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&UnitTemplate> {
        self.templates.get(id)
    }

    /// Build the definition for a template id.
    pub fn build(&self, id: &str) -> Result<UnitDefinition, UnitLoadError> {
        let template = self
            .get(id)
            .ok_or_else(|| UnitLoadError::UnknownTemplate(id.to_string()))?;
        template.build().map_err(|e| UnitLoadError::Invalid {
            path: id.to_string(),
            message: e.to_string(),
        })
    }

    /// Every id, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when no templates are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Resolve the default unit template directory.
///
/// Checks `MECH_UNIT_DATA_DIR` first, then the standard asset locations
/// relative to the repo root and to this crate.
#[must_use]
pub fn default_unit_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("MECH_UNIT_DATA_DIR") {
        let path = PathBuf::from(dir);
        if path.is_dir() {
            return Some(path);
        }
    }
    ["crates/mech_headless/assets/units", "assets/units"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOM: &str = r#"
        UnitTemplate(
            id: "LCT-1E",
            name: "Locust LCT-1E",
            tonnage: 20,
            walk_mp: 8,
            heat_sinks: 10,
            armor: {
                Head: (8, 0),
                CenterTorso: (10, 2),
                LeftTorso: (8, 2),
                RightTorso: (8, 2),
                LeftArm: (4, 0),
                RightArm: (4, 0),
                LeftLeg: (8, 0),
                RightLeg: (8, 0),
            },
            weapons: [
                (weapon: "Medium Laser", location: CenterTorso),
                (weapon: "Small Laser", location: LeftArm),
                (weapon: "Small Laser", location: RightArm),
            ],
        )
    "#;

    #[test]
    fn test_standard_registry() {
        let registry = TemplateRegistry::standard();
        assert!(registry.len() >= 5);
        assert!(registry.get("HBK-4G").is_some());
        assert!(registry.build("AS7-D").is_ok());
        assert_eq!(
            registry.build("XXX-0").unwrap_err(),
            UnitLoadError::UnknownTemplate("XXX-0".to_string())
        );
    }

    #[test]
    fn test_load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("lct-1e.ron"), CUSTOM).expect("write");
        fs::write(dir.path().join("broken.ron"), "UnitTemplate(").expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let mut registry = TemplateRegistry::standard();
        let (loaded, failed) = registry.load_from_directory(dir.path()).expect("dir exists");
        assert_eq!(loaded, vec!["LCT-1E".to_string()]);
        assert_eq!(failed.len(), 1);
        assert!(registry.build("LCT-1E").is_ok());
    }

    #[test]
    fn test_missing_directory() {
        let mut registry = TemplateRegistry::new();
        let result = registry.load_from_directory(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(UnitLoadError::DirectoryNotFound(_))));
    }
}
