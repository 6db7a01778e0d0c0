//! Identity types for providers and subscribers
//!
//! Identifiers are 64-bit and handed out by an [`IdAllocator`] owned by the
//! broadcast, so they are stable for a node's lifetime and never reused.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Provider identity - one per mounted provider node
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProviderId(pub u64);

impl ProviderId {
    #[inline]
    pub fn new(id: u64) -> Self {
        ProviderId(id)
    }
}

impl fmt::Debug for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider({:016x})", self.0)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Subscriber identity - stable for the subscriber's entire lifetime
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SubscriberId(pub u64);

impl SubscriberId {
    #[inline]
    pub fn new(id: u64) -> Self {
        SubscriberId(id)
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscriber({:016x})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Monotonic id source shared by every node of one broadcast
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_provider(&self) -> ProviderId {
        ProviderId(self.bump())
    }

    pub fn next_subscriber(&self) -> SubscriberId {
        SubscriberId(self.bump())
    }

    /// Raw sequence number, used for mount-order tree positions
    pub fn next_seq(&self) -> u64 {
        self.bump()
    }

    #[inline]
    fn bump(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}
