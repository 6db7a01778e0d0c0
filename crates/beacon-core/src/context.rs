//! Context data, provider fragments and subscriber gates

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::Namespace;

/// Schema-agnostic key/value data published into or read from a namespace
pub type ContextData = Map<String, Value>;

/// One provider's current contribution to a namespace
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderFragment {
    pub namespace: Namespace,
    pub data: ContextData,
}

impl ProviderFragment {
    pub fn new(namespace: impl Into<Namespace>, data: ContextData) -> Self {
        Self {
            namespace: namespace.into(),
            data,
        }
    }

    /// Fragment for the default namespace
    pub fn global(data: ContextData) -> Self {
        Self::new(Namespace::global(), data)
    }
}

/// Position of a node in the render tree, as a path of child indices
///
/// Ordering is lexicographic, which is pre-order traversal: an ancestor
/// sorts before its descendants and siblings sort by index.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TreePosition(Vec<u32>);

impl TreePosition {
    pub fn root() -> Self {
        TreePosition(Vec::new())
    }

    pub fn from_path(path: impl Into<Vec<u32>>) -> Self {
        TreePosition(path.into())
    }

    /// Position of this node's `index`-th child
    pub fn child(&self, index: u32) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        TreePosition(path)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn path(&self) -> &[u32] {
        &self.0
    }

    pub fn is_ancestor_of(&self, other: &TreePosition) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Debug for TreePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos{:?}", self.0)
    }
}

/// Keys a subscriber needs present before it renders its child
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum RequiredKeys {
    /// Always render
    #[default]
    None,
    Single(String),
    Many(BTreeSet<String>),
}

impl RequiredKeys {
    pub fn single(key: impl Into<String>) -> Self {
        RequiredKeys::Single(key.into())
    }

    pub fn many<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RequiredKeys::Many(keys.into_iter().map(Into::into).collect())
    }

    /// First required key absent from `state`, if any.
    ///
    /// A namespace with no entry at all is missing every key. A key whose
    /// value is JSON `null` counts as present.
    pub fn missing_from<'a>(&'a self, state: Option<&ContextData>) -> Option<&'a str> {
        let present = |key: &str| state.is_some_and(|s| s.contains_key(key));
        match self {
            RequiredKeys::None => None,
            RequiredKeys::Single(key) => (!present(key.as_str())).then_some(key.as_str()),
            RequiredKeys::Many(keys) => keys.iter().map(String::as_str).find(|&k| !present(k)),
        }
    }

    pub fn satisfied_by(&self, state: Option<&ContextData>) -> bool {
        self.missing_from(state).is_none()
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RequiredKeys::None)
    }
}

impl From<&str> for RequiredKeys {
    fn from(key: &str) -> Self {
        RequiredKeys::single(key)
    }
}

impl From<Vec<&str>> for RequiredKeys {
    fn from(keys: Vec<&str>) -> Self {
        RequiredKeys::many(keys)
    }
}
