//! File-backed durable store
//!
//! The whole store is one JSON document mapping namespace → key → record.
//! Byte records are base64-encoded. Changes are buffered while a namespace
//! is open and committed to disk on `end()`, and only if something changed.
//! A failed commit rolls the store back to what is on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DurableStore, StoreError, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredValue {
    Bytes(String),
    Str(String),
    U8(u8),
    U64(u64),
}

impl From<&Value> for StoredValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Bytes(b) => {
                StoredValue::Bytes(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Str(s) => StoredValue::Str(s.clone()),
            Value::U8(v) => StoredValue::U8(*v),
            Value::U64(v) => StoredValue::U64(*v),
        }
    }
}

impl StoredValue {
    fn to_value(&self) -> Option<Value> {
        match self {
            StoredValue::Bytes(b64) => base64::engine::general_purpose::STANDARD
                .decode(b64)
                .ok()
                .map(Value::Bytes),
            StoredValue::Str(s) => Some(Value::Str(s.clone())),
            StoredValue::U8(v) => Some(Value::U8(*v)),
            StoredValue::U64(v) => Some(Value::U64(*v)),
        }
    }
}

type Document = BTreeMap<String, BTreeMap<String, StoredValue>>;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    doc: Document,
    /// Document as last read from or written to disk
    committed: Document,
    open: Option<String>,
    dirty: bool,
}

impl FileStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let content = fs::read(&path)?;
            serde_json::from_slice(&content)?
        } else {
            Document::new()
        };

        debug!("Opened durable store {:?} ({} namespaces)", path, doc.len());
        Ok(Self {
            path,
            committed: doc.clone(),
            doc,
            open: None,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.dirty = false;
        match self.write_document() {
            Ok(()) => {
                self.committed = self.doc.clone();
                debug!("Committed durable store to {:?}", self.path);
                Ok(())
            }
            Err(e) => {
                warn!("Commit to {:?} failed, discarding changes: {}", self.path, e);
                self.doc = self.committed.clone();
                Err(e)
            }
        }
    }

    fn write_document(&self) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.doc)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn current(&mut self) -> Result<&mut BTreeMap<String, StoredValue>, StoreError> {
        let name = self.open.as_ref().ok_or(StoreError::NotOpen)?;
        Ok(self.doc.entry(name.clone()).or_default())
    }
}

impl DurableStore for FileStore {
    fn begin(&mut self, namespace: &str) -> Result<(), StoreError> {
        if let Some(open) = &self.open {
            return Err(StoreError::AlreadyOpen(open.clone()));
        }
        self.open = Some(namespace.to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<(), StoreError> {
        self.open.take().ok_or(StoreError::NotOpen)?;
        if self.dirty {
            self.commit()?;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Value> {
        let name = self.open.as_ref()?;
        self.doc.get(name)?.get(key)?.to_value()
    }

    fn put(&mut self, key: &str, value: Value) -> Result<usize, StoreError> {
        let len = value.len();
        let stored = StoredValue::from(&value);
        let ns = self.current()?;
        if ns.get(key) != Some(&stored) {
            ns.insert(key.to_string(), stored);
            self.dirty = true;
        }
        Ok(len)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let ns = self.current()?;
        if !ns.is_empty() {
            ns.clear();
            self.dirty = true;
        }
        Ok(())
    }
}
