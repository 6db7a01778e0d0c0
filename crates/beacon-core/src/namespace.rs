//! Namespaces - isolated context channels
//!
//! Namespaces are disjoint: there is no nesting or inheritance between them.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the namespace used by providers and subscribers that specify none
pub const DEFAULT_NAMESPACE: &str = "_GLOBAL_CONTEXT";

/// A named context channel
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Namespace(name.into())
    }

    /// The reserved default namespace
    #[inline]
    pub fn global() -> Self {
        Namespace(DEFAULT_NAMESPACE.to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.0 == DEFAULT_NAMESPACE
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::global()
    }
}

impl From<&str> for Namespace {
    fn from(name: &str) -> Self {
        Namespace::new(name)
    }
}

impl From<String> for Namespace {
    fn from(name: String) -> Self {
        Namespace(name)
    }
}

impl Borrow<str> for Namespace {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_is_global() {
        let ns = Namespace::default();
        assert!(ns.is_global());
        assert_eq!(ns.as_str(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Namespace::from("auth"), 1);
        assert_eq!(map.get("auth"), Some(&1));
        assert_eq!(map.get("other"), None);
    }

    #[test]
    fn test_serde_transparent() {
        let ns: Namespace = serde_json::from_str("\"theme\"").unwrap();
        assert_eq!(ns, Namespace::new("theme"));
        assert_eq!(serde_json::to_string(&ns).unwrap(), "\"theme\"");
    }
}
