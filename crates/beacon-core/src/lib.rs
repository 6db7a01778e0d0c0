//! Beacon Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout Beacon:
//! - Namespaces and the reserved default namespace
//! - Identifiers (ProviderId, SubscriberId) and tree positions
//! - Context data, provider fragments and required-key gates
//! - Error taxonomy and configuration

pub mod config;
pub mod context;
pub mod error;
pub mod id;
pub mod namespace;

pub use config::*;
pub use context::*;
pub use error::*;
pub use id::*;
pub use namespace::*;
