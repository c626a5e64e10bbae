//! Hierarchical configuration store.
//!
//! Entries live in a flat [`ConfigArea`] under `/`-delimited keys such as `app/window/width`.
//! A group is any key prefix; callers pass group prefixes including the trailing `/`. An entry
//! belongs directly to a group when no further `/` follows the prefix.
//!
//! Backend failures never reach the caller: they are logged and reported as "absent",
//! `false` or `0`.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, warn};

/// Config area trait.
pub mod area;
/// In-memory config area.
pub mod in_memory;
/// SQLite-backed config area.
#[cfg(feature = "sqlite_config_store")]
pub mod sqlite_store;

pub use area::ConfigArea;
pub use in_memory::InMemoryConfigArea;
#[cfg(feature = "sqlite_config_store")]
pub use sqlite_store::SqliteConfigArea;

#[derive(Clone)]
pub struct ConfigStore {
    area: Arc<dyn ConfigArea>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryConfigArea::new()))
    }
}

impl ConfigStore {
    pub fn new(area: Arc<dyn ConfigArea>) -> Self {
        Self { area }
    }

    /// Store persisted in the SQLite database at `path`.
    #[cfg(feature = "sqlite_config_store")]
    pub fn open(path: impl AsRef<std::path::Path>) -> crate::errors::Result<Self> {
        let area = SqliteConfigArea::new(path).map_err(|e| {
            warn!("config: cannot open database: {}", e);
            crate::errors::BridgeError::Storage(e.to_string())
        })?;
        Ok(Self::new(Arc::new(area)))
    }

    fn keys(&self) -> Vec<String> {
        self.area.keys().unwrap_or_else(|e| {
            warn!("config: cannot list keys: {}", e);
            Vec::new()
        })
    }

    fn under<'a>(keys: &'a [String], prefix: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        keys.iter().filter(move |k| k.starts_with(prefix))
    }

    /// Whether `key` is directly below `prefix`.
    fn is_direct_entry(key: &str, prefix: &str) -> bool {
        !key[prefix.len()..].contains('/')
    }

    /// Child group names below `prefix`; with `recurse` the full nested path up to the last `/`.
    fn groups(&self, prefix: &str, recurse: bool) -> Vec<String> {
        let keys = self.keys();
        let mut seen = BTreeSet::new();
        let mut groups = Vec::new();
        for key in Self::under(&keys, prefix) {
            let rest = &key[prefix.len()..];
            let end = if recurse { rest.rfind('/') } else { rest.find('/') };
            if let Some(end) = end {
                let child = rest[..end].to_string();
                if seen.insert(child.clone()) {
                    groups.push(child);
                }
            }
        }
        groups
    }

    pub fn has_entry(&self, key: &str) -> bool {
        self.get_entry(key).is_some()
    }

    /// Whether any key starts with `prefix`.
    pub fn has_group(&self, prefix: &str) -> bool {
        Self::under(&self.keys(), prefix).next().is_some()
    }

    pub fn entry_count(&self, prefix: &str, recurse: bool) -> usize {
        let keys = self.keys();
        Self::under(&keys, prefix)
            .filter(|k| recurse || Self::is_direct_entry(k, prefix))
            .count()
    }

    /// Key of the `index`-th entry directly below `prefix`.
    pub fn entry_at(&self, prefix: &str, index: usize) -> Option<String> {
        let keys = self.keys();
        let found = Self::under(&keys, prefix)
            .filter(|k| Self::is_direct_entry(k, prefix))
            .nth(index)
            .cloned();
        found
    }

    pub fn group_count(&self, prefix: &str, recurse: bool) -> usize {
        self.groups(prefix, recurse).len()
    }

    /// Name of the `index`-th child group directly below `prefix`.
    pub fn group_at(&self, prefix: &str, index: usize) -> Option<String> {
        self.groups(prefix, false).into_iter().nth(index)
    }

    pub fn get_entry(&self, key: &str) -> Option<String> {
        self.area.get_item(key).unwrap_or_else(|e| {
            warn!("config: cannot read {:?}: {}", key, e);
            None
        })
    }

    pub fn set_entry(&self, key: &str, value: &str) -> bool {
        match self.area.set_item(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!("config: cannot write {:?}: {}", key, e);
                false
            }
        }
    }

    pub fn remove_entry(&self, key: &str) -> bool {
        match self.area.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                warn!("config: cannot remove {:?}: {}", key, e);
                false
            }
        }
    }

    /// Removes every key starting with `prefix`. Returns whether anything was removed.
    pub fn remove_group(&self, prefix: &str) -> bool {
        let keys = self.keys();
        let doomed: Vec<&String> = Self::under(&keys, prefix).collect();
        for key in &doomed {
            if !self.remove_entry(key) {
                return false;
            }
        }
        !doomed.is_empty()
    }

    pub fn clear(&self) {
        if let Err(e) = self.area.clear() {
            warn!("config: cannot clear: {}", e);
        }
    }

    /// Moves every key under `old` to the same suffix under `new`.
    ///
    /// Fails without touching anything when a key outside `old` already lives under `new`,
    /// and returns `false` when nothing was renamed.
    pub fn rename_group(&self, old: &str, new: &str) -> bool {
        let keys = self.keys();
        let mut renames = Vec::new();
        for key in &keys {
            if key.starts_with(old) {
                renames.push(key);
            } else if key.starts_with(new) {
                return false;
            }
        }
        if renames.is_empty() {
            return false;
        }

        for key in &renames {
            let Some(value) = self.get_entry(key) else {
                return false;
            };
            let renamed = format!("{}{}", new, &key[old.len()..]);
            if !self.set_entry(&renamed, &value) || !self.remove_entry(key) {
                return false;
            }
        }
        debug!("config: renamed {} entries from {:?} to {:?}", renames.len(), old, new);
        true
    }
}
