//! End-to-end Integration Test Suite
//!
//! Tests that verify the complete Beacon pipeline:
//! - Merge precedence across providers and tree positions
//! - Namespace isolation
//! - Change detection precision
//! - Required-key gating
//! - Subscriber registration accounting

use beacon_core::{RequiredKeys, DEFAULT_NAMESPACE};
use serde_json::json;

use crate::{context, SimulatedHost};

// ============================================================================
// SCENARIOS
// ============================================================================

/// Result of the counter walkthrough: what the subscriber rendered after
/// each step
#[derive(Debug, Clone, PartialEq)]
pub struct CounterWalkthrough {
    pub after_mount: Option<serde_json::Value>,
    pub after_update: Option<serde_json::Value>,
    pub after_unmount_empty: bool,
    pub triggers: usize,
}

/// Provider publishes {count: 1}, updates to {count: 2}, then unmounts,
/// while a subscriber gated on "count" watches the default namespace
pub fn counter_walkthrough() -> beacon_core::BeaconResult<CounterWalkthrough> {
    let mut host = SimulatedHost::new();

    host.provide("a", None, json!({"count": 1}))?;
    host.subscribe("s", None, RequiredKeys::single("count"))?;
    let after_mount = host
        .output("s")
        .and_then(|r| r.context())
        .and_then(|c| c.get("count").cloned());

    host.provide("a", None, json!({"count": 2}))?;
    host.flush();
    let after_update = host
        .output("s")
        .and_then(|r| r.context())
        .and_then(|c| c.get("count").cloned());

    host.unmount_provider("a");
    host.flush();
    let after_unmount_empty = host.output("s").is_some_and(|r| r.is_empty());

    Ok(CounterWalkthrough {
        after_mount,
        after_update,
        after_unmount_empty,
        triggers: host.hits("s"),
    })
}
