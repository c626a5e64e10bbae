use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::storage::area::ConfigArea;

/// In-memory config area (no persistence). Used when no persistent store is configured.
#[derive(Default)]
pub struct InMemoryConfigArea {
    map: Mutex<BTreeMap<String, String>>,
}

impl InMemoryConfigArea {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> Result<T> {
        let mut guard = self.map.lock().map_err(|_| anyhow!("config area lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl ConfigArea for InMemoryConfigArea {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.with_map(|m| m.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.with_map(|m| {
            m.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.with_map(|m| {
            m.remove(key);
        })
    }

    fn clear(&self) -> Result<()> {
        self.with_map(|m| m.clear())
    }

    fn len(&self) -> Result<usize> {
        self.with_map(|m| m.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_map(|m| m.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::area::tests::check_contract;

    #[test]
    fn area_contract() {
        check_contract(&InMemoryConfigArea::new());
    }
}
