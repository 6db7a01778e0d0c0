//! Broadcast, provider and subscriber configuration

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    value_kind, BeaconError, BeaconResult, ContextData, Namespace, ProviderFragment,
    RequiredKeys, TreePosition,
};

/// What happens to a namespace that no active provider supplies any more
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Remove the namespace from the store and notify its subscribers
    #[default]
    Retract,
    /// Keep the last committed state, no notification
    Retain,
}

/// Broadcast configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Namespace used by providers and subscribers that specify none
    pub default_namespace: Namespace,
    /// Nesting depth beyond which structural comparison gives up
    pub max_compare_depth: usize,
    /// Handling of namespaces whose last provider went away
    pub retention: RetentionPolicy,
    /// Consecutive cycles one driver runs before yielding
    pub max_cycles_per_drive: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        BroadcastConfig {
            default_namespace: Namespace::global(),
            max_compare_depth: 128,
            retention: RetentionPolicy::Retract,
            max_cycles_per_drive: 64,
        }
    }
}

impl BroadcastConfig {
    pub fn with_default_namespace(mut self, namespace: impl Into<Namespace>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    pub fn with_max_compare_depth(mut self, depth: usize) -> Self {
        self.max_compare_depth = depth;
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_max_cycles_per_drive(mut self, cycles: usize) -> Self {
        self.max_cycles_per_drive = cycles;
        self
    }

    /// Load from a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> BeaconResult<Self> {
        let config: BroadcastConfig =
            serde_json::from_str(json).map_err(|e| BeaconError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BeaconResult<()> {
        if self.max_compare_depth == 0 {
            return Err(BeaconError::InvalidConfig(
                "max_compare_depth must be at least 1".into(),
            ));
        }
        if self.max_cycles_per_drive == 0 {
            return Err(BeaconError::InvalidConfig(
                "max_cycles_per_drive must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Provider props
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderConfig {
    pub namespace: Option<Namespace>,
    pub data: Option<ContextData>,
    /// Position in the render tree; mount order when unset
    pub position: Option<TreePosition>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<Namespace>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn data(mut self, data: ContextData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn at(mut self, position: TreePosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Parse dynamic props of the form `{ "namespace"?: string, "data": object }`
    pub fn from_json(props: Value) -> BeaconResult<Self> {
        let Value::Object(mut props) = props else {
            return Err(BeaconError::MissingProviderData);
        };

        let namespace = parse_namespace(props.remove("namespace"))?;
        let data = match props.remove("data") {
            None | Some(Value::Null) => return Err(BeaconError::MissingProviderData),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(BeaconError::InvalidProviderData {
                    found: value_kind(&other),
                })
            }
        };

        Ok(ProviderConfig {
            namespace,
            data: Some(data),
            position: None,
        })
    }

    /// Validate and build the fragment this provider publishes
    pub fn fragment(&self, default_namespace: &Namespace) -> BeaconResult<ProviderFragment> {
        let data = self.data.clone().ok_or(BeaconError::MissingProviderData)?;
        let namespace = self
            .namespace
            .clone()
            .unwrap_or_else(|| default_namespace.clone());
        Ok(ProviderFragment { namespace, data })
    }
}

/// Subscriber props, generic over the host's child node type
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriberConfig<C> {
    pub namespace: Option<Namespace>,
    pub requires: RequiredKeys,
    pub children: Vec<C>,
}

impl<C> Default for SubscriberConfig<C> {
    fn default() -> Self {
        Self {
            namespace: None,
            requires: RequiredKeys::None,
            children: Vec::new(),
        }
    }
}

impl<C> SubscriberConfig<C> {
    pub fn new(child: C) -> Self {
        Self {
            children: vec![child],
            ..Self::default()
        }
    }

    pub fn with_children(children: Vec<C>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }

    pub fn namespace(mut self, namespace: impl Into<Namespace>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn requires(mut self, requires: impl Into<RequiredKeys>) -> Self {
        self.requires = requires.into();
        self
    }

    /// Parse dynamic props of the form
    /// `{ "namespace"?: string, "requires"?: null | string | [string] }`
    pub fn from_json(props: Value, children: Vec<C>) -> BeaconResult<Self> {
        let mut props = match props {
            Value::Object(map) => map,
            Value::Null => ContextData::new(),
            other => {
                return Err(BeaconError::InvalidConfig(format!(
                    "subscriber props must be an object, got {}",
                    value_kind(&other)
                )))
            }
        };

        let namespace = parse_namespace(props.remove("namespace"))?;
        let requires = match props.remove("requires") {
            None | Some(Value::Null) => RequiredKeys::None,
            Some(Value::String(key)) => RequiredKeys::Single(key),
            Some(Value::Array(items)) => {
                let keys: BTreeSet<String> = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(key) => Ok(key),
                        _ => Err(BeaconError::InvalidRequiredKeys),
                    })
                    .collect::<BeaconResult<_>>()?;
                RequiredKeys::Many(keys)
            }
            Some(_) => return Err(BeaconError::InvalidRequiredKeys),
        };

        Ok(SubscriberConfig {
            namespace,
            requires,
            children,
        })
    }

    /// Ensure exactly one child is wrapped and take it
    pub fn take_only_child(&mut self) -> BeaconResult<C> {
        if self.children.len() != 1 {
            return Err(BeaconError::ChildCount {
                found: self.children.len(),
            });
        }
        self.children.pop().ok_or(BeaconError::ChildCount { found: 0 })
    }
}

fn parse_namespace(value: Option<Value>) -> BeaconResult<Option<Namespace>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) => Ok(Some(Namespace::from(name))),
        Some(other) => Err(BeaconError::InvalidNamespace {
            found: value_kind(&other),
        }),
    }
}
