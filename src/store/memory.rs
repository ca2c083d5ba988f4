use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use super::Store;

/// An in-memory store, `Mutex`-backed since the engine's chunk locks assume
/// the store itself may be touched from multiple threads.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let map = self.map.lock().unwrap();
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> io::Result<()> {
        let mut map = self.map.lock().unwrap();
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        let mut map = self.map.lock().unwrap();
        map.retain(|k, _| k != key && !k.starts_with(&format!("{key}/")));
        Ok(())
    }

    fn list_prefix(&self, prefix: &str) -> io::Result<Vec<String>> {
        let map = self.map.lock().unwrap();
        Ok(map.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    fn exists(&self, key: &str) -> io::Result<bool> {
        let map = self.map.lock().unwrap();
        Ok(map.contains_key(key))
    }
}
