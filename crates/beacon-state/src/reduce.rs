//! Reducer - merges provider fragments into per-namespace state

use std::collections::HashMap;

use beacon_core::{ContextData, Namespace, ProviderFragment};

/// Merged state for every namespace some fragment supplied
pub type ContextState = HashMap<Namespace, ContextData>;

/// Merge fragments in traversal order.
///
/// Later fragments overwrite earlier ones key by key, so two providers in
/// the same namespace contributing disjoint keys both survive. Overwrites
/// are shallow: a nested mapping is replaced, not merged.
pub fn reduce<'a, I>(fragments: I) -> ContextState
where
    I: IntoIterator<Item = &'a ProviderFragment>,
{
    let mut merged = ContextState::new();

    for fragment in fragments {
        let state = merged.entry(fragment.namespace.clone()).or_default();
        for (key, value) in &fragment.data {
            state.insert(key.clone(), value.clone());
        }
    }

    merged
}
