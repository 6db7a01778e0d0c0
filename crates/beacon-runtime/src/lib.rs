//! Beacon Runtime - lifecycle adapters and propagation cycles
//!
//! A [`Broadcast`] owns one context store and one subscriber registry.
//! Providers and subscribers are mounted against it and drive the
//! reduce -> diff -> commit -> notify cycle:
//! 1. A provider mounts, updates or unmounts
//! 2. The active provider set is reduced per namespace
//! 3. Changed namespaces are committed to the store
//! 4. Subscribers of changed namespaces are triggered
//! 5. Triggered subscribers re-read their namespace and re-render

pub mod broadcast;
pub mod provider;
pub mod subscriber;
pub mod telemetry;

pub use broadcast::*;
pub use provider::*;
pub use subscriber::*;
pub use telemetry::*;
