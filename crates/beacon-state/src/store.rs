//! Context store - the committed, merged view per namespace

use std::collections::HashMap;

use beacon_core::{ContextData, Namespace};

/// Last committed merged state for each namespace
#[derive(Debug, Default, Clone)]
pub struct ContextStore {
    contexts: HashMap<Namespace, ContextData>,
}

impl ContextStore {
    pub fn new() -> Self {
        ContextStore::default()
    }

    /// Current state of a namespace, `None` if nothing was ever committed
    pub fn read(&self, namespace: &str) -> Option<&ContextData> {
        self.contexts.get(namespace)
    }

    /// Owned copy of a namespace's state
    pub fn snapshot(&self, namespace: &str) -> Option<ContextData> {
        self.contexts.get(namespace).cloned()
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.contexts.contains_key(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.contexts.keys()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Replace a namespace's state; `None` removes the entry.
    /// Only the change propagator writes here.
    pub(crate) fn commit(&mut self, namespace: Namespace, state: Option<ContextData>) {
        match state {
            Some(state) => {
                self.contexts.insert(namespace, state);
            }
            None => {
                self.contexts.remove(&namespace);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_commit_and_read() {
        let mut store = ContextStore::new();
        assert!(store.read("a").is_none());

        let mut data = ContextData::new();
        data.insert("x".into(), json!(1));
        store.commit(Namespace::new("a"), Some(data));

        assert!(store.contains("a"));
        assert_eq!(store.read("a").and_then(|s| s.get("x")), Some(&json!(1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_commit_none_removes() {
        let mut store = ContextStore::new();
        store.commit(Namespace::new("a"), Some(ContextData::new()));
        store.commit(Namespace::new("a"), None);

        assert!(store.is_empty());
        assert!(store.snapshot("a").is_none());
    }
}
