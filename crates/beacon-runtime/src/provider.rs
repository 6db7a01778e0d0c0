//! Provider lifecycle - the active provider set and mounted provider handles

use std::collections::{BTreeMap, HashMap};

use beacon_core::{
    BeaconResult, ContextData, Namespace, ProviderConfig, ProviderFragment, ProviderId, TreePosition,
};
use tracing::trace;

use crate::{Broadcast, LifecycleEvents};

/// Fragments of every mounted provider, in render-tree traversal order
#[derive(Debug, Default, Clone)]
pub struct ProviderSet {
    entries: BTreeMap<(TreePosition, ProviderId), ProviderFragment>,
    positions: HashMap<ProviderId, TreePosition>,
    /// Top-level slot for the next provider mounted without a position,
    /// past every top-level index in use
    next_slot: u32,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider; without a position it becomes the last top-level
    /// sibling. Returns the position it was filed at.
    pub fn insert(
        &mut self,
        id: ProviderId,
        position: Option<TreePosition>,
        fragment: ProviderFragment,
    ) -> TreePosition {
        self.remove(id);
        let position = position.unwrap_or_else(|| TreePosition::root().child(self.next_slot));
        self.claim_slot(&position);
        self.positions.insert(id, position.clone());
        self.entries.insert((position.clone(), id), fragment);
        position
    }

    /// Replace a provider's fragment, optionally moving it. Returns false
    /// if the provider is not in the set.
    pub fn update(
        &mut self,
        id: ProviderId,
        position: Option<TreePosition>,
        fragment: ProviderFragment,
    ) -> bool {
        let Some(current) = self.positions.get(&id).cloned() else {
            return false;
        };
        let position = position.unwrap_or(current.clone());
        self.claim_slot(&position);
        if position != current {
            self.entries.remove(&(current, id));
            self.positions.insert(id, position.clone());
        }
        self.entries.insert((position, id), fragment);
        true
    }

    pub fn remove(&mut self, id: ProviderId) -> Option<ProviderFragment> {
        let position = self.positions.remove(&id)?;
        self.entries.remove(&(position, id))
    }

    pub fn get(&self, id: ProviderId) -> Option<&ProviderFragment> {
        let position = self.positions.get(&id)?;
        self.entries.get(&(position.clone(), id))
    }

    pub fn position(&self, id: ProviderId) -> Option<&TreePosition> {
        self.positions.get(&id)
    }

    /// Snapshot of the fragments in traversal order
    pub fn fragments(&self) -> Vec<ProviderFragment> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Unpositioned providers always land after every top-level index seen
    fn claim_slot(&mut self, position: &TreePosition) {
        if let Some(&top) = position.path().first() {
            self.next_slot = self.next_slot.max(top.saturating_add(1));
        }
    }
}

/// A mounted provider. Dropping it unmounts it.
#[derive(Debug)]
pub struct Provider {
    id: ProviderId,
    broadcast: Broadcast,
    mounted: bool,
}

impl Provider {
    pub(crate) fn new(id: ProviderId, broadcast: Broadcast) -> Self {
        Self {
            id,
            broadcast,
            mounted: true,
        }
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Namespace this provider currently publishes into
    pub fn namespace(&self) -> Option<Namespace> {
        self.broadcast
            .with_providers(|set| set.get(self.id).map(|f| f.namespace.clone()))
    }

    /// Data this provider currently publishes
    pub fn data(&self) -> Option<ContextData> {
        self.broadcast
            .with_providers(|set| set.get(self.id).map(|f| f.data.clone()))
    }

    /// Re-render with new props. The position is kept unless the new
    /// props carry one.
    pub fn update(&mut self, config: ProviderConfig) -> BeaconResult<()> {
        let fragment = config.fragment(&self.broadcast.config().default_namespace)?;
        trace!(provider = %self.id, namespace = %fragment.namespace, "provider update");
        self.broadcast
            .with_providers_mut(|set| set.update(self.id, config.position, fragment));
        self.broadcast.provider_set_changed();
        Ok(())
    }

    /// Publish new data into the same namespace
    pub fn set_data(&mut self, data: ContextData) -> BeaconResult<()> {
        let namespace = self.namespace();
        let mut config = ProviderConfig::new().data(data);
        config.namespace = namespace;
        self.update(config)
    }

    pub fn unmount(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        trace!(provider = %self.id, "provider unmount");
        self.broadcast.with_providers_mut(|set| set.remove(self.id));
        self.broadcast.provider_set_changed();
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn fragment(ns: &str, v: Value) -> ProviderFragment {
        match v {
            Value::Object(data) => ProviderFragment::new(ns, data),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_mount_order_without_positions() {
        let mut set = ProviderSet::new();
        set.insert(ProviderId::new(2), None, fragment("a", json!({"n": 1})));
        set.insert(ProviderId::new(1), None, fragment("a", json!({"n": 2})));

        let order: Vec<_> = set.fragments().into_iter().map(|f| f.data["n"].clone()).collect();
        assert_eq!(order, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_descendant_after_ancestor() {
        let mut set = ProviderSet::new();
        let parent = TreePosition::from_path(vec![0]);
        let child = parent.child(3);

        set.insert(ProviderId::new(1), Some(child), fragment("a", json!({"who": "child"})));
        set.insert(ProviderId::new(2), Some(parent), fragment("a", json!({"who": "parent"})));

        let order: Vec<_> = set.fragments().into_iter().map(|f| f.data["who"].clone()).collect();
        assert_eq!(order, vec![json!("parent"), json!("child")]);
    }

    #[test]
    fn test_unpositioned_after_positioned_sibling() {
        let mut set = ProviderSet::new();
        set.insert(
            ProviderId::new(1),
            Some(TreePosition::from_path(vec![5])),
            fragment("a", json!({"v": "first"})),
        );
        let later = set.insert(ProviderId::new(2), None, fragment("a", json!({"v": "later"})));

        assert_eq!(later, TreePosition::from_path(vec![6]));
        let merged = beacon_state::reduce(&set.fragments());
        assert_eq!(merged["a"]["v"], json!("later"));
    }

    #[test]
    fn test_moved_provider_reserves_slot() {
        let mut set = ProviderSet::new();
        let id = ProviderId::new(1);
        set.insert(id, None, fragment("a", json!({"v": 1})));
        set.update(id, Some(TreePosition::from_path(vec![3, 1])), fragment("a", json!({"v": 1})));

        let next = set.insert(ProviderId::new(2), None, fragment("a", json!({"v": 2})));
        assert_eq!(next, TreePosition::from_path(vec![4]));
    }

    #[test]
    fn test_update_keeps_position() {
        let mut set = ProviderSet::new();
        let id = ProviderId::new(1);
        let pos = set.insert(id, None, fragment("a", json!({"v": 1})));

        assert!(set.update(id, None, fragment("a", json!({"v": 2}))));
        assert_eq!(set.position(id), Some(&pos));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(id).map(|f| f.data["v"].clone()), Some(json!(2)));
    }

    #[test]
    fn test_update_moves_position() {
        let mut set = ProviderSet::new();
        let id = ProviderId::new(1);
        set.insert(id, None, fragment("a", json!({})));

        let target = TreePosition::from_path(vec![9, 9]);
        assert!(set.update(id, Some(target.clone()), fragment("a", json!({}))));
        assert_eq!(set.position(id), Some(&target));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_update_unknown_provider() {
        let mut set = ProviderSet::new();
        assert!(!set.update(ProviderId::new(5), None, fragment("a", json!({}))));
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut set = ProviderSet::new();
        let id = ProviderId::new(1);
        set.insert(id, None, fragment("a", json!({})));

        assert!(set.remove(id).is_some());
        assert!(set.remove(id).is_none());
        assert!(set.is_empty());
    }
}
