use anyhow::Result;

/// Object-safe flat key/value area backing the config store.
pub trait ConfigArea: Send + Sync {
    /// Retrieves the value associated with the given key, or `None` if not found.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Sets the value for the given key, overwriting any existing value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    fn len(&self) -> Result<usize>;

    /// All keys in ascending order.
    fn keys(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Contract every area implementation must satisfy.
    pub(crate) fn check_contract(area: &dyn ConfigArea) {
        assert_eq!(area.len().unwrap(), 0);
        assert!(area.get_item("missing").unwrap().is_none());

        area.set_item("b", "2").unwrap();
        area.set_item("a", "1").unwrap();
        assert_eq!(area.len().unwrap(), 2);
        assert_eq!(area.get_item("a").unwrap().as_deref(), Some("1"));
        assert_eq!(area.keys().unwrap(), vec!["a", "b"]);

        // overwrite keeps len
        area.set_item("a", "ONE").unwrap();
        assert_eq!(area.len().unwrap(), 2);
        assert_eq!(area.get_item("a").unwrap().as_deref(), Some("ONE"));

        area.remove_item("b").unwrap();
        assert_eq!(area.len().unwrap(), 1);
        assert!(area.get_item("b").unwrap().is_none());

        area.clear().unwrap();
        assert_eq!(area.len().unwrap(), 0);
        assert!(area.keys().unwrap().is_empty());
    }
}
