//! Subscriber lifecycle - registration, namespace re-binding and the
//! required-keys render gate

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beacon_core::{
    BeaconResult, ContextData, Namespace, RequiredKeys, SubscriberConfig, SubscriberId,
};
use beacon_state::{SubscriberHandle, Trigger};
use tracing::trace;

use crate::{Broadcast, LifecycleEvents};

/// The wrapped child together with the namespace state injected into it
#[derive(Clone, Debug, PartialEq)]
pub struct Injected<C> {
    pub child: C,
    /// `None` when the namespace has no committed state
    pub context: Option<ContextData>,
}

/// Output of a subscriber render
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered<C> {
    Child(Injected<C>),
    /// A required key is missing
    Empty,
}

impl<C> Rendered<C> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Rendered::Empty)
    }

    pub fn injected(&self) -> Option<&Injected<C>> {
        match self {
            Rendered::Child(injected) => Some(injected),
            Rendered::Empty => None,
        }
    }

    pub fn context(&self) -> Option<&ContextData> {
        self.injected().and_then(|i| i.context.as_ref())
    }
}

/// A mounted subscriber wrapping exactly one child. Dropping it
/// deregisters it.
#[derive(Debug)]
pub struct Subscriber<C> {
    broadcast: Broadcast,
    handle: SubscriberHandle,
    child: C,
    mounted: Arc<AtomicBool>,
}

impl<C> Subscriber<C> {
    pub(crate) fn mount<F>(
        broadcast: Broadcast,
        mut config: SubscriberConfig<C>,
        on_change: F,
    ) -> BeaconResult<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let child = config.take_only_child()?;
        let id = broadcast.allocate_subscriber_id();
        let namespace = config
            .namespace
            .unwrap_or_else(|| broadcast.config().default_namespace.clone());

        // Triggers already snapshotted by a running cycle must not reach an
        // unmounted subscriber.
        let mounted = Arc::new(AtomicBool::new(true));
        let alive = Arc::clone(&mounted);
        let trigger: Trigger = Arc::new(move || {
            if alive.load(Ordering::Acquire) {
                on_change();
            }
        });

        let handle = SubscriberHandle::new(id, namespace, config.requires, trigger);
        broadcast.subscriber_mounted(handle.clone());

        Ok(Self {
            broadcast,
            handle,
            child,
            mounted,
        })
    }

    pub fn id(&self) -> SubscriberId {
        self.handle.id
    }

    pub fn namespace(&self) -> &Namespace {
        &self.handle.namespace
    }

    pub fn requires(&self) -> &RequiredKeys {
        &self.handle.requires
    }

    pub fn child(&self) -> &C {
        &self.child
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Current committed state of this subscriber's namespace
    pub fn state(&self) -> Option<ContextData> {
        self.broadcast.current_state(self.handle.namespace.as_str())
    }

    /// Move to another namespace. The subscriber keeps its id and is
    /// registered under the new namespace before leaving the old one.
    pub fn set_namespace(&mut self, namespace: impl Into<Namespace>) {
        let namespace = namespace.into();
        if namespace == self.handle.namespace {
            return;
        }
        let old = self.handle.namespace.clone();
        self.handle = self
            .broadcast
            .subscriber_namespace_changed(&self.handle, &old, &namespace);
    }

    pub fn set_requires(&mut self, requires: impl Into<RequiredKeys>) {
        self.handle.requires = requires.into();
        self.broadcast.subscriber_updated(self.handle.clone());
    }

    /// Re-render with new props: validates the child count, then applies
    /// the namespace and required keys
    pub fn update(&mut self, mut config: SubscriberConfig<C>) -> BeaconResult<()> {
        let child = config.take_only_child()?;
        let namespace = config
            .namespace
            .unwrap_or_else(|| self.broadcast.config().default_namespace.clone());

        self.child = child;
        self.set_namespace(namespace);
        if config.requires != self.handle.requires {
            self.set_requires(config.requires);
        }
        Ok(())
    }

    pub fn unmount(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if self.mounted.swap(false, Ordering::AcqRel) {
            self.broadcast.subscriber_unmounted(&self.handle);
        }
    }
}

impl<C: Clone> Subscriber<C> {
    /// Evaluate the render gate against the namespace's current state
    pub fn render(&self) -> Rendered<C> {
        let context = self.state();
        if let Some(missing) = self.handle.requires.missing_from(context.as_ref()) {
            trace!(subscriber = %self.handle.id, key = missing, "required key missing, rendering nothing");
            return Rendered::Empty;
        }
        Rendered::Child(Injected {
            child: self.child.clone(),
            context,
        })
    }
}

impl<C> Drop for Subscriber<C> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{BeaconError, ProviderConfig};
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    fn data(v: Value) -> ContextData {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        (hits, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_mount_registers_under_default_namespace() {
        let broadcast = Broadcast::default();
        let subscriber = broadcast
            .mount_subscriber(SubscriberConfig::new("child"), || {})
            .unwrap();

        assert!(subscriber.namespace().is_global());
        assert!(broadcast.is_registered(beacon_core::DEFAULT_NAMESPACE, subscriber.id()));
    }

    #[test]
    fn test_child_count_enforced() {
        let broadcast = Broadcast::default();
        let none = broadcast.mount_subscriber(SubscriberConfig::<u8>::with_children(vec![]), || {});
        let many = broadcast.mount_subscriber(SubscriberConfig::with_children(vec![1u8, 2]), || {});

        assert!(matches!(none, Err(BeaconError::ChildCount { found: 0 })));
        assert!(matches!(many, Err(BeaconError::ChildCount { found: 2 })));
        assert_eq!(broadcast.subscriber_count(beacon_core::DEFAULT_NAMESPACE), 0);
    }

    #[test]
    fn test_render_without_requirements() {
        let broadcast = Broadcast::default();
        let subscriber = broadcast
            .mount_subscriber(SubscriberConfig::new("child").namespace("empty"), || {})
            .unwrap();

        // no state at all still renders, with nothing injected
        let rendered = subscriber.render();
        assert_eq!(
            rendered,
            Rendered::Child(Injected {
                child: "child",
                context: None
            })
        );
    }

    #[test]
    fn test_gate_opens_when_key_published() {
        let broadcast = Broadcast::default();
        let (hits, on_change) = counter();
        let subscriber = broadcast
            .mount_subscriber(
                SubscriberConfig::new("child")
                    .namespace("auth")
                    .requires(vec!["token"]),
                on_change,
            )
            .unwrap();

        let mut provider = broadcast
            .mount_provider(ProviderConfig::new().namespace("auth").data(ContextData::new()))
            .unwrap();
        assert!(subscriber.render().is_empty());

        provider.set_data(data(json!({"token": "abc"}))).unwrap();
        let rendered = subscriber.render();
        assert_eq!(rendered.context(), Some(&data(json!({"token": "abc"}))));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_namespace_moves_registration() {
        let broadcast = Broadcast::default();
        let (hits, on_change) = counter();
        let mut subscriber = broadcast
            .mount_subscriber(SubscriberConfig::new(()).namespace("a"), on_change)
            .unwrap();
        let id = subscriber.id();

        subscriber.set_namespace("b");

        assert_eq!(subscriber.id(), id);
        assert!(!broadcast.is_registered("a", id));
        assert!(broadcast.is_registered("b", id));

        let _pa = broadcast
            .mount_provider(ProviderConfig::new().namespace("a").data(data(json!({"x": 1}))))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let _pb = broadcast
            .mount_provider(ProviderConfig::new().namespace("b").data(data(json!({"x": 1}))))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_requires_updates_in_place() {
        let broadcast = Broadcast::default();
        let (hits, on_change) = counter();
        let mut subscriber = broadcast
            .mount_subscriber(SubscriberConfig::new("child").namespace("a"), on_change)
            .unwrap();
        let id = subscriber.id();
        let mut provider = broadcast
            .mount_provider(ProviderConfig::new().namespace("a").data(data(json!({"x": 1}))))
            .unwrap();

        subscriber.set_requires("token");
        assert!(subscriber.render().is_empty());
        assert_eq!(subscriber.id(), id);
        assert_eq!(broadcast.subscriber_count("a"), 1);

        // the re-filed handle still receives triggers
        provider.set_data(data(json!({"x": 1, "token": "t"}))).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!subscriber.render().is_empty());
    }

    #[test]
    fn test_update_applies_props() {
        let broadcast = Broadcast::default();
        let mut subscriber = broadcast
            .mount_subscriber(SubscriberConfig::new("old").namespace("a"), || {})
            .unwrap();

        subscriber
            .update(SubscriberConfig::new("new").namespace("b").requires("k"))
            .unwrap();

        assert_eq!(*subscriber.child(), "new");
        assert_eq!(subscriber.namespace().as_str(), "b");
        assert_eq!(subscriber.requires(), &RequiredKeys::single("k"));
        assert_eq!(broadcast.subscriber_count("b"), 1);
        assert_eq!(broadcast.subscriber_count("a"), 0);

        let bad = subscriber.update(SubscriberConfig::with_children(vec!["x", "y"]));
        assert!(matches!(bad, Err(BeaconError::ChildCount { found: 2 })));
        assert_eq!(*subscriber.child(), "new");
    }

    #[test]
    fn test_unmounted_receives_no_triggers() {
        let broadcast = Broadcast::default();
        let (hits, on_change) = counter();
        let subscriber = broadcast
            .mount_subscriber(SubscriberConfig::new(()).namespace("a"), on_change)
            .unwrap();
        let id = subscriber.id();

        subscriber.unmount();
        assert!(!broadcast.is_registered("a", id));

        let _p = broadcast
            .mount_provider(ProviderConfig::new().namespace("a").data(data(json!({"x": 1}))))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
