//! State comparison used for change detection

use beacon_core::{ComparisonError, ContextData, Namespace};
use serde_json::{Number, Value};

/// Decides whether a namespace's state changed between two cycles
pub trait StateComparator: Send + Sync {
    /// `None` stands for "no entry". Errors are isolated to `namespace`.
    fn equal(
        &self,
        namespace: &Namespace,
        next: Option<&ContextData>,
        current: Option<&ContextData>,
    ) -> Result<bool, ComparisonError>;
}

/// Deep structural equality with a nesting limit
#[derive(Debug, Clone, Copy)]
pub struct StructuralComparator {
    max_depth: usize,
}

impl StructuralComparator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn maps_equal(&self, a: &ContextData, b: &ContextData, depth: usize) -> Option<bool> {
        if depth > self.max_depth {
            return None;
        }
        if a.len() != b.len() {
            return Some(false);
        }
        for (key, left) in a {
            let Some(right) = b.get(key) else {
                return Some(false);
            };
            if !self.values_equal(left, right, depth + 1)? {
                return Some(false);
            }
        }
        Some(true)
    }

    // None means the depth limit was hit
    fn values_equal(&self, a: &Value, b: &Value, depth: usize) -> Option<bool> {
        if depth > self.max_depth {
            return None;
        }
        match (a, b) {
            (Value::Object(a), Value::Object(b)) => self.maps_equal(a, b, depth),
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                for (left, right) in a.iter().zip(b) {
                    if !self.values_equal(left, right, depth + 1)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            (Value::Number(a), Value::Number(b)) => Some(numbers_equal(a, b)),
            _ => Some(a == b),
        }
    }
}

/// Numeric equality across representations: `1` and `1.0` are equal
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a.is_f64() == b.is_f64() {
        return a == b;
    }
    let (float, int) = if a.is_f64() { (a, b) } else { (b, a) };
    let Some(float) = float.as_f64() else {
        return false;
    };
    let int = int
        .as_i64()
        .map(i128::from)
        .or_else(|| int.as_u64().map(i128::from));

    float.fract() == 0.0
        && int.is_some_and(|int| float as i128 == int && int as f64 == float)
}

impl Default for StructuralComparator {
    fn default() -> Self {
        Self::new(128)
    }
}

impl StateComparator for StructuralComparator {
    fn equal(
        &self,
        namespace: &Namespace,
        next: Option<&ContextData>,
        current: Option<&ContextData>,
    ) -> Result<bool, ComparisonError> {
        match (next, current) {
            (None, None) => Ok(true),
            (Some(_), None) | (None, Some(_)) => Ok(false),
            (Some(a), Some(b)) => {
                self.maps_equal(a, b, 0)
                    .ok_or_else(|| ComparisonError::DepthExceeded {
                        namespace: namespace.clone(),
                        limit: self.max_depth,
                    })
            }
        }
    }
}
