use std::collections::BTreeMap;

/// String-keyed attribute storage of the host platform.
///
/// The store is the single source of truth for declared properties: bridges
/// never cache, every read goes back to `get_raw`.
pub trait AttributeStore {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&mut self, key: &str, value: &str);
    fn remove_raw(&mut self, key: &str);
}

/// In-memory [`AttributeStore`], ordered by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeMap {
    attrs: BTreeMap<String, String>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl AttributeStore for AttributeMap {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.attrs.get(key).cloned()
    }

    fn set_raw(&mut self, key: &str, value: &str) {
        self.attrs.insert(key.to_owned(), value.to_owned());
    }

    fn remove_raw(&mut self, key: &str) {
        self.attrs.remove(key);
    }
}
