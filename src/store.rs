use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::signature::{ChangesDocument, HookSignature, KeyDocument};
use crate::templates::TemplateDocument;

/// Outcome of reading a persisted document.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    /// No file: a first compilation.
    Missing,
    Found(T),
    /// Unreadable or corrupt; treated like `Missing`.
    Degraded { reason: String },
}

impl<T> Loaded<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Loaded::Found(value) => Some(value),
            Loaded::Missing | Loaded::Degraded { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DocumentKind {
    Hooks,
    Keys,
    Templates,
    Changes,
}

impl DocumentKind {
    fn suffix(&self) -> &'static str {
        match self {
            DocumentKind::Hooks => "hooks",
            DocumentKind::Keys => "keys",
            DocumentKind::Templates => "templates",
            DocumentKind::Changes => "changes",
        }
    }
}

/// Directory of per-component documents, one generation deep.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, component: &str, kind: DocumentKind) -> PathBuf {
        let safe_name = component.replace(['/', '\\', ':'], "_");
        self.dir.join(format!("{}.{}.json", safe_name, kind.suffix()))
    }

    fn read<T: DeserializeOwned>(&self, component: &str, kind: DocumentKind) -> Loaded<T> {
        let path = self.path_for(component, kind);
        let data = match fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Loaded::Missing,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable document, treating as first run");
                return Loaded::Degraded {
                    reason: e.to_string(),
                };
            }
        };
        match serde_json::from_str(&data) {
            Ok(value) => Loaded::Found(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt document, treating as first run");
                Loaded::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Serializes into a temp file in the same directory, then renames over the target.
    fn write<T: Serialize>(&self, component: &str, kind: DocumentKind, value: &T) -> Result<(), StoreError> {
        let path = self.path_for(component, kind);
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let data = serde_json::to_vec_pretty(value)?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&data).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|source| StoreError::Persist {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "document written");
        Ok(())
    }

    pub fn load_signature(&self, component: &str) -> Loaded<HookSignature> {
        self.read(component, DocumentKind::Hooks)
    }

    pub fn save_signature(&self, signature: &HookSignature) -> Result<(), StoreError> {
        self.write(&signature.component_name, DocumentKind::Hooks, signature)
    }

    pub fn load_keys(&self, component: &str) -> Loaded<KeyDocument> {
        self.read(component, DocumentKind::Keys)
    }

    pub fn save_keys(&self, keys: &KeyDocument) -> Result<(), StoreError> {
        self.write(&keys.component_name, DocumentKind::Keys, keys)
    }

    pub fn load_templates(&self, component: &str) -> Loaded<TemplateDocument> {
        self.read(component, DocumentKind::Templates)
    }

    pub fn save_templates(&self, document: &TemplateDocument) -> Result<(), StoreError> {
        self.write(&document.component, DocumentKind::Templates, document)
    }

    pub fn load_changes(&self, component: &str) -> Loaded<ChangesDocument> {
        self.read(component, DocumentKind::Changes)
    }

    /// Writes the change document when it has changes, otherwise removes a stale one.
    pub fn save_changes(&self, document: &ChangesDocument) -> Result<(), StoreError> {
        if !document.changes.is_empty() {
            return self.write(&document.component_name, DocumentKind::Changes, document);
        }
        let path = self.path_for(&document.component_name, DocumentKind::Changes);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SlotKind;
    use crate::signature::{HookEntry, StructuralChange};
    use chrono::Utc;

    fn signature() -> HookSignature {
        HookSignature {
            component_name: "Counter".to_string(),
            timestamp: Utc::now(),
            hooks: vec![HookEntry {
                kind: SlotKind::State,
                var_name: Some("count".to_string()),
                index: 0,
                discriminants: Default::default(),
            }],
        }
    }

    #[test]
    fn test_missing_document_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        assert_eq!(store.load_signature("Counter"), Loaded::Missing);
    }

    #[test]
    fn test_signature_round_trip_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let sig = signature();
        store.save_signature(&sig).unwrap();
        assert_eq!(store.load_signature("Counter").into_option(), Some(sig));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Counter.hooks.json".to_string()]);
    }

    #[test]
    fn test_corrupt_document_degrades() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Counter.hooks.json"), "{ not json").unwrap();
        let store = DocumentStore::new(dir.path());
        assert!(matches!(store.load_signature("Counter"), Loaded::Degraded { .. }));
    }

    #[test]
    fn test_empty_changes_remove_stale_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let changes = ChangesDocument::new(
            "Counter",
            "Counter.tsx",
            vec![StructuralChange::TreeDeleted {
                address: "1.2".to_string(),
            }],
        );
        store.save_changes(&changes).unwrap();
        assert!(dir.path().join("Counter.changes.json").exists());

        store
            .save_changes(&ChangesDocument::new("Counter", "Counter.tsx", vec![]))
            .unwrap();
        assert!(!dir.path().join("Counter.changes.json").exists());
        assert_eq!(store.load_changes("Counter"), Loaded::Missing);
    }
}
