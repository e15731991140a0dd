//! Durable key-value storage
//!
//! Models a flash-backed preferences store: records are grouped under a
//! namespace, and every batch of reads/writes is bracketed by `begin`/`end`.
//! [`Namespace`] does the bracketing so callers cannot forget to close.
//!
//! Reads that come back with a different size or type than asked for are
//! reported as absent. Writes report the number of bytes the store accepted.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;
use tracing::warn;

/// Namespace all node records live under
pub const NAMESPACE: &str = "lorawan";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no namespace is open")]
    NotOpen,

    #[error("namespace {0:?} is already open")]
    AlreadyOpen(String),

    #[error("write to {key:?} rejected: {reason}")]
    WriteRejected { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt store file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A single stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Str(String),
    U8(u8),
    U64(u64),
}

impl Value {
    /// Number of bytes this record occupies
    pub fn len(&self) -> usize {
        match self {
            Value::Bytes(b) => b.len(),
            Value::Str(s) => s.len(),
            Value::U8(_) => 1,
            Value::U64(_) => 8,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Backend interface of a durable store
pub trait DurableStore {
    fn begin(&mut self, namespace: &str) -> Result<(), StoreError>;

    fn end(&mut self) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, returning the number of bytes accepted.
    /// Backends may skip the physical write when the value is unchanged.
    fn put(&mut self, key: &str, value: Value) -> Result<usize, StoreError>;

    /// Remove every record in the open namespace
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Scoped access to one namespace; closes the namespace on drop
pub struct Namespace<'a, S: DurableStore + ?Sized> {
    store: &'a mut S,
    closed: bool,
}

impl<'a, S: DurableStore + ?Sized> Namespace<'a, S> {
    pub fn open(store: &'a mut S, namespace: &str) -> Result<Self, StoreError> {
        store.begin(namespace)?;
        Ok(Self {
            store,
            closed: false,
        })
    }

    /// Read a byte record that must be exactly `N` bytes long
    pub fn get_array<const N: usize>(&self, key: &str) -> Option<[u8; N]> {
        match self.store.get(key)? {
            Value::Bytes(bytes) => bytes.as_slice().try_into().ok(),
            _ => None,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.store.get(key)? {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_u8(&self, key: &str) -> Option<u8> {
        match self.store.get(key)? {
            Value::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.store.get(key)? {
            Value::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn put_bytes(&mut self, key: &str, bytes: &[u8]) -> Result<usize, StoreError> {
        self.store.put(key, Value::Bytes(bytes.to_vec()))
    }

    pub fn put_string(&mut self, key: &str, s: &str) -> Result<usize, StoreError> {
        self.store.put(key, Value::Str(s.to_string()))
    }

    pub fn put_u8(&mut self, key: &str, v: u8) -> Result<usize, StoreError> {
        self.store.put(key, Value::U8(v))
    }

    pub fn put_u64(&mut self, key: &str, v: u64) -> Result<usize, StoreError> {
        self.store.put(key, Value::U64(v))
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.clear()
    }

    /// Close the namespace, surfacing any error from committing it
    pub fn close(mut self) -> Result<(), StoreError> {
        self.closed = true;
        self.store.end()
    }
}

impl<S: DurableStore + ?Sized> Drop for Namespace<'_, S> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.store.end() {
                warn!("Failed to close durable namespace: {}", e);
            }
        }
    }
}
