//! In-memory store of parsed configuration documents.

use crate::core::DocumentFormat;
use crate::error::{ConfigError, Result};
use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

/// Map from file name to parsed document.
pub type DocumentMap = HashMap<String, Arc<Value>>;

/// Read-only view of every loaded document at one point in time.
///
/// Cloning a snapshot is a reference count bump. Later reloads never change
/// a snapshot that has already been handed out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot(Arc<DocumentMap>);

impl ConfigSnapshot {
    /// Get a document by file name.
    pub fn document(&self, name: &str) -> Option<&Value> {
        self.0.get(name).map(Arc::as_ref)
    }

    /// File names present in this snapshot, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Render the snapshot as a single JSON object keyed by file name.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(name, doc)| (name.clone(), Value::clone(doc)))
                .collect(),
        )
    }
}

impl Deref for ConfigSnapshot {
    type Target = DocumentMap;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Holds the parsed documents of a configuration directory.
///
/// Reads are lock-free: the whole map lives behind an `ArcSwap` and every
/// write builds a new map and swaps it in, so readers either see the map
/// before or after a write, never in between.
///
/// # Examples
///
/// ```rust
/// use confwatch::core::ConfigStore;
///
/// let store = ConfigStore::new();
/// store.load("a.json", br#"{"x": 1}"#).unwrap();
/// assert_eq!(store.get("a.json").unwrap()["x"], 1);
/// assert!(store.load("a.json", b"{x:}").is_err());
/// assert_eq!(store.get("a.json").unwrap()["x"], 1);
/// ```
#[derive(Debug, Default)]
pub struct ConfigStore {
    documents: ArcSwap<DocumentMap>,
}

impl ConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw` and insert or replace the document stored under `name`.
    ///
    /// The format is picked from the extension of `name`, defaulting to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if `raw` is not a valid document.
    /// The store is left untouched in that case.
    pub fn load(&self, name: &str, raw: &[u8]) -> Result<()> {
        let document = Arc::new(DocumentFormat::for_name(name).parse(name, raw)?);

        self.documents.rcu(|current| {
            let mut next = DocumentMap::clone(current);
            next.insert(name.to_string(), Arc::clone(&document));
            next
        });

        Ok(())
    }

    /// Remove the document stored under `name`.
    ///
    /// Returns `true` if a document was removed.
    pub fn remove(&self, name: &str) -> bool {
        if !self.contains(name) {
            return false;
        }

        let mut removed = false;
        self.documents.rcu(|current| {
            let mut next = DocumentMap::clone(current);
            removed = next.remove(name).is_some();
            next
        });
        removed
    }

    /// Get the document stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if no document with that name was
    /// ever successfully loaded.
    pub fn get(&self, name: &str) -> Result<Arc<Value>> {
        self.documents
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))
    }

    /// Take a read-only snapshot of every loaded document.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot(self.documents.load_full())
    }

    /// Check whether a document is loaded under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.documents.load().contains_key(name)
    }

    /// Number of loaded documents.
    pub fn len(&self) -> usize {
        self.documents.load().len()
    }

    /// Whether no documents are loaded.
    pub fn is_empty(&self) -> bool {
        self.documents.load().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_and_get() {
        let store = ConfigStore::new();
        store.load("a.json", br#"{"x": 1, "nested": {"y": [1, 2]}}"#).unwrap();

        let doc = store.get("a.json").unwrap();
        assert_eq!(*doc, json!({"x": 1, "nested": {"y": [1, 2]}}));
    }

    #[test]
    fn test_reload_replaces_wholesale() {
        let store = ConfigStore::new();
        store.load("a.json", br#"{"x": 1, "y": 2}"#).unwrap();
        store.load("a.json", br#"{"x": 3}"#).unwrap();

        assert_eq!(*store.get("a.json").unwrap(), json!({"x": 3}));
    }

    #[test]
    fn test_failed_load_keeps_previous_value() {
        let store = ConfigStore::new();
        store.load("b.json", br#"{"ok": true}"#).unwrap();

        let result = store.load("b.json", b"{x:}");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
        assert_eq!(*store.get("b.json").unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_failed_load_does_not_insert() {
        let store = ConfigStore::new();
        assert!(store.load("bad.json", b"not json").is_err());
        assert!(!store.contains("bad.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_missing() {
        let store = ConfigStore::new();
        match store.get("nonexistent.json") {
            Err(ConfigError::NotFound(name)) => assert_eq!(name, "nonexistent.json"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_is_not_live() {
        let store = ConfigStore::new();
        store.load("a.json", br#"{"x": 1}"#).unwrap();

        let before = store.snapshot();
        store.load("a.json", br#"{"x": 2}"#).unwrap();
        store.load("b.json", br#"{"y": "hi"}"#).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(before.document("a.json"), Some(&json!({"x": 1})));

        let after = store.snapshot();
        assert_eq!(after.names(), vec!["a.json", "b.json"]);
        assert_eq!(after.document("a.json"), Some(&json!({"x": 2})));
    }

    #[test]
    fn test_remove() {
        let store = ConfigStore::new();
        store.load("a.json", b"1").unwrap();

        assert!(store.remove("a.json"));
        assert!(!store.remove("a.json"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_snapshot_to_value() {
        let store = ConfigStore::new();
        store.load("a.json", br#"{"x": 1}"#).unwrap();
        store.load("b.json", b"[true]").unwrap();

        assert_eq!(
            store.snapshot().to_value(),
            json!({"a.json": {"x": 1}, "b.json": [true]})
        );
    }

    #[test]
    fn test_concurrent_readers_see_whole_maps() {
        let store = Arc::new(ConfigStore::new());
        store.load("a.json", br#"{"v": 0}"#).unwrap();
        store.load("b.json", br#"{"v": 0}"#).unwrap();

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let snapshot = store.snapshot();
                    assert_eq!(snapshot.len(), 2);
                }
            })
        };

        for i in 1..200 {
            let raw = format!(r#"{{"v": {i}}}"#);
            store.load("a.json", raw.as_bytes()).unwrap();
        }

        reader.join().unwrap();
        assert_eq!(*store.get("a.json").unwrap(), json!({"v": 199}));
    }
}
