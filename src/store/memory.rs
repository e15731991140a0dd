//! In-memory durable store
//!
//! Survives simulated power loss (it is only dropped with the process) and
//! counts physical writes so tests can check that unchanged values are not
//! rewritten.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::{DurableStore, StoreError, Value};

#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: HashMap<String, BTreeMap<String, Value>>,
    open: Option<String>,
    writes: usize,
    reject_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physical writes performed so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Make every subsequent `put` fail, as a worn-out or full flash would
    pub fn set_reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }

    /// Number of records stored under `namespace`
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map_or(0, |ns| ns.len())
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    fn current(&mut self) -> Result<&mut BTreeMap<String, Value>, StoreError> {
        let name = self.open.as_ref().ok_or(StoreError::NotOpen)?;
        Ok(self.namespaces.entry(name.clone()).or_default())
    }
}

impl DurableStore for MemoryStore {
    fn begin(&mut self, namespace: &str) -> Result<(), StoreError> {
        if let Some(open) = &self.open {
            return Err(StoreError::AlreadyOpen(open.clone()));
        }
        self.open = Some(namespace.to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<(), StoreError> {
        self.open.take().map(|_| ()).ok_or(StoreError::NotOpen)
    }

    fn get(&self, key: &str) -> Option<Value> {
        let name = self.open.as_ref()?;
        self.namespaces.get(name)?.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: Value) -> Result<usize, StoreError> {
        if self.reject_writes {
            return Err(StoreError::WriteRejected {
                key: key.to_string(),
                reason: "store is read-only".to_string(),
            });
        }

        let len = value.len();
        let ns = self.current()?;
        if ns.get(key) == Some(&value) {
            debug!("{} unchanged, write skipped", key);
            return Ok(len);
        }
        ns.insert(key.to_string(), value);
        self.writes += 1;
        Ok(len)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.current()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_value_is_not_rewritten() {
        let mut store = MemoryStore::new();
        store.begin("ns").unwrap();
        store.put("k", Value::U8(1)).unwrap();
        store.put("k", Value::U8(1)).unwrap();
        assert_eq!(store.writes(), 1);
        store.put("k", Value::U8(2)).unwrap();
        assert_eq!(store.writes(), 2);
        store.end().unwrap();
    }

    #[test]
    fn test_access_requires_open_namespace() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.put("k", Value::U8(1)),
            Err(StoreError::NotOpen)
        ));
        assert!(matches!(store.end(), Err(StoreError::NotOpen)));

        store.begin("ns").unwrap();
        assert!(matches!(store.begin("ns"), Err(StoreError::AlreadyOpen(_))));
        store.put("k", Value::U8(1)).unwrap();
        store.end().unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let mut store = MemoryStore::new();
        store.begin("a").unwrap();
        store.put("k", Value::U8(1)).unwrap();
        store.end().unwrap();

        store.begin("b").unwrap();
        assert_eq!(store.get("k"), None);
        store.clear().unwrap();
        store.end().unwrap();

        assert_eq!(store.len("a"), 1);
    }

    #[test]
    fn test_rejected_writes() {
        let mut store = MemoryStore::new();
        store.set_reject_writes(true);
        store.begin("ns").unwrap();
        assert!(store.put("k", Value::U8(1)).is_err());
        store.end().unwrap();
        assert!(store.is_empty("ns"));
    }
}
