//! Pipeline properties, checked against generated provider sets

use beacon_core::{BeaconResult, RequiredKeys};
use serde_json::Value;

use crate::SimulatedHost;

/// One generated provider: namespace and data object
pub type GeneratedProvider = (String, Value);

/// Mount every provider, subscribe once per namespace, then re-publish
/// the same data. Returns how many triggers fired during the replay.
pub fn replay_trigger_count(providers: &[GeneratedProvider]) -> BeaconResult<usize> {
    let mut host = SimulatedHost::new();

    for (i, (namespace, data)) in providers.iter().enumerate() {
        host.provide(&format!("p{i}"), Some(namespace.as_str()), data.clone())?;
    }

    let mut namespaces: Vec<&String> = providers.iter().map(|(ns, _)| ns).collect();
    namespaces.sort();
    namespaces.dedup();
    for namespace in &namespaces {
        host.subscribe(&format!("s-{namespace}"), Some(namespace.as_str()), RequiredKeys::None)?;
    }

    for (i, (namespace, data)) in providers.iter().enumerate() {
        host.provide(&format!("p{i}"), Some(namespace.as_str()), data.clone())?;
    }

    Ok(namespaces
        .iter()
        .map(|ns| host.hits(&format!("s-{ns}")))
        .sum())
}

/// Value the last provider in mount order published for `key` in
/// `namespace`
pub fn expected_value<'a>(
    providers: &'a [GeneratedProvider],
    namespace: &str,
    key: &str,
) -> Option<&'a Value> {
    providers
        .iter()
        .rev()
        .filter(|(ns, _)| ns == namespace)
        .find_map(|(_, data)| data.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn providers() -> impl Strategy<Value = Vec<GeneratedProvider>> {
        let provider = (
            prop::sample::select(vec!["a", "b", "c"]),
            prop::collection::btree_map("[w-z]", 0i64..5, 0..3),
        )
            .prop_map(|(ns, entries)| {
                let data: serde_json::Map<String, Value> =
                    entries.into_iter().map(|(k, v)| (k, json!(v))).collect();
                (ns.to_string(), Value::Object(data))
            });
        prop::collection::vec(provider, 1..8)
    }

    proptest! {
        #[test]
        fn replay_is_silent(providers in providers()) {
            prop_assert_eq!(replay_trigger_count(&providers).unwrap(), 0);
        }

        #[test]
        fn committed_state_is_last_writer(providers in providers()) {
            let mut host = SimulatedHost::new();
            for (i, (namespace, data)) in providers.iter().enumerate() {
                host.provide(&format!("p{i}"), Some(namespace.as_str()), data.clone()).unwrap();
            }

            for (namespace, _) in &providers {
                let state = host.state(namespace).unwrap();
                for key in ["w", "x", "y", "z"] {
                    prop_assert_eq!(state.get(key), expected_value(&providers, namespace, key));
                }
            }
        }
    }

    #[test]
    fn test_replay_single() {
        let providers = vec![("a".to_string(), json!({"x": 1}))];
        assert_eq!(replay_trigger_count(&providers).unwrap(), 0);
    }
}
