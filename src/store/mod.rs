mod value;

pub use value::FromValue;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::InfraError;

type ReloadListener = Arc<dyn Fn() + Send + Sync>;

/// Hot-reloadable configuration store over a JSON document.
///
/// The tree is replaced atomically on load/reload, so reads are wait-free
/// and always observe a fully consistent document — never a partial blend
/// of old and new. Listeners fire on reload only, outside every store lock,
/// and re-read whatever they care about through [`get`](Self::get).
pub struct ConfigStore {
    doc: ArcSwap<Value>,
    source: Mutex<Option<PathBuf>>,
    listeners: Mutex<AHashMap<String, Vec<ReloadListener>>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            doc: ArcSwap::from_pointee(Value::Null),
            source: Mutex::new(None),
            listeners: Mutex::new(AHashMap::new()),
        }
    }

    /// Parse the file at `path` and atomically replace the current tree.
    /// Records the path for [`reload`](Self::reload). Does not notify
    /// listeners.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), InfraError> {
        let path = path.as_ref();
        let root = read_document(path)?;
        self.doc.store(Arc::new(root));
        *self.source.lock() = Some(path.to_path_buf());
        Ok(())
    }

    /// Re-read the last loaded path, replace the tree, then invoke every
    /// registered listener once.
    pub fn reload(&self) -> Result<(), InfraError> {
        let path = self
            .source
            .lock()
            .clone()
            .ok_or(InfraError::InvalidState("reload before load"))?;

        let root = read_document(&path)?;
        self.doc.store(Arc::new(root));

        // Snapshot the callbacks so they run without any store lock held;
        // listeners may call back into the store.
        let callbacks: Vec<ReloadListener> = {
            let listeners = self.listeners.lock();
            listeners.values().flatten().cloned().collect()
        };
        for cb in callbacks {
            cb();
        }

        Ok(())
    }

    /// Register a reload callback under `key_path`. The path is a bucket
    /// key only; every registered listener fires on any reload.
    pub fn register_listener(
        &self,
        key_path: impl Into<String>,
        cb: impl Fn() + Send + Sync + 'static,
    ) {
        self.listeners
            .lock()
            .entry(key_path.into())
            .or_default()
            .push(Arc::new(cb));
    }

    /// Read a typed value at a dotted key path, falling back to `default`
    /// on a missing path, a null leaf, or a failed conversion.
    ///
    /// Tokens resolve against objects as keys and against arrays as
    /// non-negative decimal indices; an empty token, a malformed or
    /// out-of-range index, or a scalar in a non-terminal position all mean
    /// "no such path".
    pub fn get<T: FromValue>(&self, key_path: &str, default: T) -> T {
        let doc = self.doc.load();
        match traverse(&doc, key_path) {
            Some(node) if !node.is_null() => T::from_value(node).unwrap_or(default),
            _ => default,
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read_document(path: &Path) -> Result<Value, InfraError> {
    let text = fs::read_to_string(path)
        .map_err(|e| InfraError::ResourceUnavailable(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| InfraError::MalformedInput(format!("{}: {e}", path.display())))
}

fn traverse<'a>(root: &'a Value, key_path: &str) -> Option<&'a Value> {
    let mut curr = root;

    for token in key_path.split('.') {
        if token.is_empty() {
            return None;
        }

        if let Some(map) = curr.as_object() {
            curr = map.get(token)?;
            continue;
        }

        if let Some(arr) = curr.as_array() {
            if !token.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let idx: usize = token.parse().ok()?;
            curr = arr.get(idx)?;
            continue;
        }

        // Scalar in a non-terminal position.
        return None;
    }

    Some(curr)
}
