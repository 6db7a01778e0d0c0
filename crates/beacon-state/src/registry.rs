//! Subscriber registry - who wants to hear about which namespace
//!
//! Each namespace maps to the set of subscriber handles filed under it,
//! keyed by subscriber id for O(1) insert and remove.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use beacon_core::{Namespace, RequiredKeys, SubscriberId};
use tracing::{trace, warn};

/// Re-evaluation request; the host decides what "re-evaluate" means
pub type Trigger = Arc<dyn Fn() + Send + Sync>;

/// A registered subscriber
#[derive(Clone)]
pub struct SubscriberHandle {
    pub id: SubscriberId,
    pub namespace: Namespace,
    pub requires: RequiredKeys,
    trigger: Trigger,
}

impl SubscriberHandle {
    pub fn new(
        id: SubscriberId,
        namespace: Namespace,
        requires: RequiredKeys,
        trigger: Trigger,
    ) -> Self {
        Self {
            id,
            namespace,
            requires,
            trigger,
        }
    }

    /// Ask the subscriber to re-evaluate
    pub fn trigger(&self) {
        (self.trigger)();
    }

    /// Same subscriber, filed under another namespace
    pub fn rebound(&self, namespace: Namespace) -> Self {
        Self {
            namespace,
            ..self.clone()
        }
    }
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

/// Namespace -> (Subscriber ID -> handle)
#[derive(Debug, Default, Clone)]
pub struct SubscriberRegistry {
    subscribers: HashMap<Namespace, HashMap<SubscriberId, SubscriberHandle>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a handle under its namespace, replacing any earlier handle
    /// with the same id in that namespace
    pub fn register(&mut self, handle: SubscriberHandle) {
        trace!(subscriber = %handle.id, namespace = %handle.namespace, "register");
        self.subscribers
            .entry(handle.namespace.clone())
            .or_default()
            .insert(handle.id, handle);
    }

    /// Remove a handle. Unknown ids are logged and ignored.
    pub fn deregister(&mut self, namespace: &Namespace, id: SubscriberId) -> bool {
        let removed = match self.subscribers.get_mut(namespace) {
            Some(handles) => {
                let removed = handles.remove(&id).is_some();
                if handles.is_empty() {
                    self.subscribers.remove(namespace);
                }
                removed
            }
            None => false,
        };

        if removed {
            trace!(subscriber = %id, namespace = %namespace, "deregister");
        } else {
            warn!(
                subscriber = %id,
                namespace = %namespace,
                "deregistering subscriber that is not registered under namespace"
            );
        }
        removed
    }

    /// Move a subscriber to another namespace: register under the new one
    /// first, then drop the old registration
    pub fn rebind(&mut self, handle: &SubscriberHandle, namespace: Namespace) -> SubscriberHandle {
        let rebound = handle.rebound(namespace);
        self.register(rebound.clone());
        if handle.namespace != rebound.namespace {
            self.deregister(&handle.namespace, handle.id);
        }
        rebound
    }

    /// Snapshot of every handle filed under any of `namespaces`, each
    /// subscriber at most once
    pub fn handles_for<'a, I>(&self, namespaces: I) -> Vec<SubscriberHandle>
    where
        I: IntoIterator<Item = &'a Namespace>,
    {
        let mut seen = HashSet::new();
        let mut handles = Vec::new();

        for namespace in namespaces {
            let Some(registered) = self.subscribers.get(namespace) else {
                continue;
            };
            for handle in registered.values() {
                if seen.insert(handle.id) {
                    handles.push(handle.clone());
                }
            }
        }

        handles
    }

    pub fn contains(&self, namespace: &str, id: SubscriberId) -> bool {
        self.subscribers
            .get(namespace)
            .is_some_and(|handles| handles.contains_key(&id))
    }

    /// Number of subscribers under a namespace
    pub fn count(&self, namespace: &str) -> usize {
        self.subscribers.get(namespace).map_or(0, HashMap::len)
    }

    /// Number of registrations across all namespaces
    pub fn total(&self) -> usize {
        self.subscribers.values().map(HashMap::len).sum()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.subscribers.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handle(id: u64, ns: &str) -> SubscriberHandle {
        SubscriberHandle::new(
            SubscriberId::new(id),
            Namespace::new(ns),
            RequiredKeys::None,
            Arc::new(|| {}),
        )
    }

    #[test]
    fn test_register_and_count() {
        let mut registry = SubscriberRegistry::new();
        registry.register(handle(1, "a"));
        registry.register(handle(2, "a"));
        registry.register(handle(3, "b"));

        assert_eq!(registry.count("a"), 2);
        assert_eq!(registry.count("b"), 1);
        assert_eq!(registry.total(), 3);
    }

    #[test]
    fn test_register_same_id_twice_is_one_entry() {
        let mut registry = SubscriberRegistry::new();
        registry.register(handle(1, "a"));
        registry.register(handle(1, "a"));
        assert_eq!(registry.count("a"), 1);
    }

    #[test]
    fn test_deregister_idempotent() {
        let mut registry = SubscriberRegistry::new();
        registry.register(handle(1, "a"));

        assert!(registry.deregister(&Namespace::new("a"), SubscriberId::new(1)));
        assert!(!registry.deregister(&Namespace::new("a"), SubscriberId::new(1)));
        assert!(!registry.deregister(&Namespace::new("zzz"), SubscriberId::new(9)));
        assert_eq!(registry.total(), 0);
        assert_eq!(registry.namespaces().count(), 0);
    }

    #[test]
    fn test_rebind_keeps_single_registration() {
        let mut registry = SubscriberRegistry::new();
        let original = handle(1, "a");
        registry.register(original.clone());

        let moved = registry.rebind(&original, Namespace::new("b"));

        assert_eq!(moved.id, original.id);
        assert!(!registry.contains("a", original.id));
        assert!(registry.contains("b", original.id));
        assert_eq!(registry.total(), 1);
    }

    #[test]
    fn test_rebind_same_namespace_noop() {
        let mut registry = SubscriberRegistry::new();
        let original = handle(1, "a");
        registry.register(original.clone());

        registry.rebind(&original, Namespace::new("a"));
        assert!(registry.contains("a", original.id));
        assert_eq!(registry.total(), 1);
    }

    #[test]
    fn test_handles_for_dedup() {
        let mut registry = SubscriberRegistry::new();
        registry.register(handle(1, "a"));
        registry.register(handle(2, "b"));

        let a = Namespace::new("a");
        let b = Namespace::new("b");
        let handles = registry.handles_for([&a, &b, &a]);
        assert_eq!(handles.len(), 2);
    }

    #[test]
    fn test_trigger_invokes_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handle = SubscriberHandle::new(
            SubscriberId::new(1),
            Namespace::global(),
            RequiredKeys::None,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        handle.trigger();
        handle.trigger();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
