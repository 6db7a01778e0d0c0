//! Simulated host tree
//!
//! Stands in for the render framework: providers and subscribers are
//! mounted by name, triggers are counted, and `flush` re-renders every
//! subscriber that was triggered since the last flush, the way a host
//! would schedule re-renders.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use beacon_core::{
    BeaconError, BeaconResult, BroadcastConfig, ContextData, ProviderConfig, RequiredKeys,
    SubscriberConfig, TreePosition,
};
use beacon_runtime::{Broadcast, Provider, Rendered, Subscriber};
use serde_json::Value;

/// Converts a JSON object literal into context data
pub fn context(value: Value) -> ContextData {
    match value {
        Value::Object(map) => map,
        _ => ContextData::new(),
    }
}

/// Counts trigger invocations
#[derive(Debug, Clone, Default)]
pub struct TriggerCounter {
    hits: Arc<AtomicUsize>,
}

impl TriggerCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn() + Send + Sync + 'static {
        let hits = Arc::clone(&self.hits);
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

struct MountedSubscriber {
    subscriber: Subscriber<String>,
    counter: TriggerCounter,
    /// Trigger count at the last render
    rendered_at: usize,
    last: Rendered<String>,
}

/// A host tree holding named providers and subscribers
pub struct SimulatedHost {
    broadcast: Broadcast,
    providers: BTreeMap<String, Provider>,
    subscribers: BTreeMap<String, MountedSubscriber>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::with_broadcast(Broadcast::default())
    }

    pub fn with_config(config: BroadcastConfig) -> BeaconResult<Self> {
        Ok(Self::with_broadcast(Broadcast::new(config)?))
    }

    pub fn with_broadcast(broadcast: Broadcast) -> Self {
        Self {
            broadcast,
            providers: BTreeMap::new(),
            subscribers: BTreeMap::new(),
        }
    }

    pub fn broadcast(&self) -> &Broadcast {
        &self.broadcast
    }

    /// Mount `name`, or re-render it with new data if already mounted
    pub fn provide(&mut self, name: &str, namespace: Option<&str>, data: Value) -> BeaconResult<()> {
        self.provide_at(name, namespace, None, data)
    }

    pub fn provide_at(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        position: Option<TreePosition>,
        data: Value,
    ) -> BeaconResult<()> {
        let mut props = serde_json::Map::new();
        if let Some(namespace) = namespace {
            props.insert("namespace".into(), Value::from(namespace));
        }
        props.insert("data".into(), data);

        let mut config = ProviderConfig::from_json(Value::Object(props))?;
        config.position = position;

        match self.providers.get_mut(name) {
            Some(provider) => provider.update(config),
            None => {
                let provider = self.broadcast.mount_provider(config)?;
                self.providers.insert(name.to_string(), provider);
                Ok(())
            }
        }
    }

    pub fn unmount_provider(&mut self, name: &str) -> bool {
        match self.providers.remove(name) {
            Some(provider) => {
                provider.unmount();
                true
            }
            None => false,
        }
    }

    /// Mount a subscriber whose single child is its own name, and render it
    pub fn subscribe(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        requires: RequiredKeys,
    ) -> BeaconResult<()> {
        if self.subscribers.contains_key(name) {
            return Err(BeaconError::InvalidConfig(format!("subscriber {name} already mounted")));
        }

        let mut config = SubscriberConfig::new(name.to_string());
        config.namespace = namespace.map(Into::into);
        config.requires = requires;

        let counter = TriggerCounter::new();
        let subscriber = self.broadcast.mount_subscriber(config, counter.callback())?;
        let last = subscriber.render();
        self.subscribers.insert(
            name.to_string(),
            MountedSubscriber {
                subscriber,
                counter,
                rendered_at: 0,
                last,
            },
        );
        Ok(())
    }

    /// Change a subscriber's namespace prop and re-render it
    pub fn rebind(&mut self, name: &str, namespace: &str) -> bool {
        let Some(mounted) = self.subscribers.get_mut(name) else {
            return false;
        };
        mounted.subscriber.set_namespace(namespace);
        mounted.last = mounted.subscriber.render();
        true
    }

    pub fn unsubscribe(&mut self, name: &str) -> bool {
        match self.subscribers.remove(name) {
            Some(mounted) => {
                mounted.subscriber.unmount();
                true
            }
            None => false,
        }
    }

    /// Re-render triggered subscribers; returns the names re-rendered
    pub fn flush(&mut self) -> Vec<String> {
        let mut rendered = Vec::new();
        for (name, mounted) in &mut self.subscribers {
            let hits = mounted.counter.hits();
            if hits > mounted.rendered_at {
                mounted.last = mounted.subscriber.render();
                mounted.rendered_at = hits;
                rendered.push(name.clone());
            }
        }
        rendered
    }

    /// Output of the subscriber's last render
    pub fn output(&self, name: &str) -> Option<&Rendered<String>> {
        self.subscribers.get(name).map(|m| &m.last)
    }

    pub fn hits(&self, name: &str) -> usize {
        self.subscribers.get(name).map_or(0, |m| m.counter.hits())
    }

    pub fn counter(&self, name: &str) -> Option<TriggerCounter> {
        self.subscribers.get(name).map(|m| m.counter.clone())
    }

    pub fn state(&self, namespace: &str) -> Option<ContextData> {
        self.broadcast.current_state(namespace)
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}
