//! Beacon Test Harness - host simulation and pipeline validation
//!
//! This crate provides:
//! - A simulated host tree that mounts named providers and subscribers
//! - End-to-end scenarios over the full reduce/propagate/notify pipeline
//! - Property tests for merge precedence and change detection

pub mod host;
pub mod integration;
pub mod properties;

pub use host::*;
