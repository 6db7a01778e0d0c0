//! Beacon State Engine - merge, diff and notify
//!
//! This crate implements the propagation pipeline:
//! - Reducing provider fragments into per-namespace state
//! - The committed context store
//! - Structural comparison of namespace state
//! - Subscriber registration per namespace
//! - Change detection, commit and subscriber fan-out

pub mod compare;
pub mod propagate;
pub mod reduce;
pub mod registry;
pub mod store;

pub use compare::*;
pub use propagate::*;
pub use reduce::*;
pub use registry::*;
pub use store::*;
