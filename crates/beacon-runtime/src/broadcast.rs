//! Broadcast - the owner of one context store and one subscriber registry
//!
//! Every provider and subscriber is mounted against a broadcast, so
//! independent trees (or tests) never share state.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use beacon_core::{
    BeaconResult, BroadcastConfig, ContextData, IdAllocator, Namespace, ProviderConfig,
    SubscriberConfig, SubscriberId,
};
use beacon_state::{
    fan_out, reduce, ChangePropagator, ContextStore, PropagationObserver, PropagationStats,
    SubscriberHandle, SubscriberRegistry,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::{Provider, ProviderSet, Subscriber};

/// Events the host tree reports to the broadcast
pub trait LifecycleEvents {
    /// A provider mounted, updated or unmounted
    fn provider_set_changed(&self);

    /// A subscriber mounted
    fn subscriber_mounted(&self, handle: SubscriberHandle);

    /// A subscriber changed its required keys without moving namespaces
    fn subscriber_updated(&self, handle: SubscriberHandle);

    /// A subscriber moved namespaces; returns the re-bound handle
    fn subscriber_namespace_changed(
        &self,
        handle: &SubscriberHandle,
        old: &Namespace,
        new: &Namespace,
    ) -> SubscriberHandle;

    fn subscriber_unmounted(&self, handle: &SubscriberHandle);
}

#[derive(Debug, Default)]
struct CycleState {
    /// A driver is running cycles
    running: bool,
    /// Thread of the running driver
    driver: Option<ThreadId>,
    /// The provider set changed since the last cycle started
    dirty: bool,
    /// Bumped on every provider change
    requested: u64,
    /// Newest change generation whose cycle has completed
    committed: u64,
}

struct Inner {
    config: BroadcastConfig,
    ids: IdAllocator,
    providers: Mutex<ProviderSet>,
    store: Mutex<ContextStore>,
    registry: Mutex<SubscriberRegistry>,
    propagator: ChangePropagator,
    cycle: Mutex<CycleState>,
    cycle_done: Condvar,
    stats: Mutex<PropagationStats>,
}

/// Shared handle to one broadcast; clones refer to the same state
#[derive(Clone)]
pub struct Broadcast {
    inner: Arc<Inner>,
}

impl Broadcast {
    pub fn new(config: BroadcastConfig) -> BeaconResult<Self> {
        config.validate()?;
        let propagator = ChangePropagator::from_config(&config);
        Ok(Self::with_propagator(config, propagator))
    }

    /// Broadcast reporting pipeline failures to `observer`
    pub fn with_observer(
        config: BroadcastConfig,
        observer: Arc<dyn PropagationObserver>,
    ) -> BeaconResult<Self> {
        config.validate()?;
        let propagator = ChangePropagator::from_config(&config).with_observer(observer);
        Ok(Self::with_propagator(config, propagator))
    }

    pub fn with_propagator(config: BroadcastConfig, propagator: ChangePropagator) -> Self {
        Broadcast {
            inner: Arc::new(Inner {
                config,
                ids: IdAllocator::new(),
                providers: Mutex::new(ProviderSet::new()),
                store: Mutex::new(ContextStore::new()),
                registry: Mutex::new(SubscriberRegistry::new()),
                propagator,
                cycle: Mutex::new(CycleState::default()),
                cycle_done: Condvar::new(),
                stats: Mutex::new(PropagationStats::new()),
            }),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.inner.config
    }

    /// Mount a provider and run a propagation cycle
    pub fn mount_provider(&self, config: ProviderConfig) -> BeaconResult<Provider> {
        let fragment = config.fragment(&self.inner.config.default_namespace)?;
        let id = self.inner.ids.next_provider();
        let position = self
            .inner
            .providers
            .lock()
            .insert(id, config.position, fragment);
        trace!(provider = %id, ?position, "provider mount");

        let provider = Provider::new(id, self.clone());
        self.provider_set_changed();
        Ok(provider)
    }

    /// Mount a subscriber; `on_change` runs whenever its namespace changes
    pub fn mount_subscriber<C, F>(
        &self,
        config: SubscriberConfig<C>,
        on_change: F,
    ) -> BeaconResult<Subscriber<C>>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Subscriber::mount(self.clone(), config, on_change)
    }

    /// Committed state of a namespace, `None` if it has no entry
    pub fn current_state(&self, namespace: &str) -> Option<ContextData> {
        self.inner.store.lock().snapshot(namespace)
    }

    /// Namespaces with committed state, sorted
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut namespaces: Vec<_> = self.inner.store.lock().namespaces().cloned().collect();
        namespaces.sort();
        namespaces
    }

    pub fn subscriber_count(&self, namespace: &str) -> usize {
        self.inner.registry.lock().count(namespace)
    }

    pub fn is_registered(&self, namespace: &str, id: SubscriberId) -> bool {
        self.inner.registry.lock().contains(namespace, id)
    }

    pub fn provider_count(&self) -> usize {
        self.inner.providers.lock().len()
    }

    pub fn stats(&self) -> PropagationStats {
        self.inner.stats.lock().clone()
    }

    /// Run cycles until the provider set is clean.
    ///
    /// A change made on the driving thread, including from inside a
    /// subscriber trigger, becomes a follow-up cycle of the running driver.
    /// A change made on any other thread waits until a cycle that started
    /// after it has completed, or drives the cycles itself when no driver
    /// is running.
    pub fn refresh(&self) {
        let current = thread::current().id();
        {
            let mut cycle = self.inner.cycle.lock();
            cycle.dirty = true;
            cycle.requested += 1;
            let wanted = cycle.requested;

            loop {
                if cycle.committed >= wanted {
                    return;
                }
                if !cycle.running {
                    break;
                }
                if cycle.driver == Some(current) {
                    trace!("cycle in progress, deferring provider change");
                    return;
                }
                self.inner.cycle_done.wait(&mut cycle);
            }

            cycle.running = true;
            cycle.driver = Some(current);
        }

        let mut driver = DriverGuard {
            broadcast: self,
            armed: true,
        };
        let limit = self.inner.config.max_cycles_per_drive;
        let mut ran = 0;
        loop {
            let generation = {
                let mut cycle = self.inner.cycle.lock();
                if !cycle.dirty || ran >= limit {
                    if cycle.dirty {
                        warn!(
                            cycles = ran,
                            "provider set still changing, yielding until next change"
                        );
                    }
                    cycle.running = false;
                    cycle.driver = None;
                    driver.armed = false;
                    self.inner.cycle_done.notify_all();
                    break;
                }
                cycle.dirty = false;
                cycle.requested
            };

            self.run_cycle();
            ran += 1;

            self.inner.cycle.lock().committed = generation;
            self.inner.cycle_done.notify_all();
        }
    }

    fn run_cycle(&self) {
        let fragments = self.inner.providers.lock().fragments();
        let next = reduce(&fragments);

        let report = {
            let mut store = self.inner.store.lock();
            self.inner.propagator.diff_and_commit(&mut store, next)
        };
        let handles = {
            let registry = self.inner.registry.lock();
            self.inner.propagator.affected(&registry, &report)
        };

        // no lock held: triggers may read state or change providers
        let triggered = fan_out(&handles);
        self.inner.stats.lock().record(&report, triggered);
        debug!(
            providers = fragments.len(),
            changed = report.changed.len(),
            triggered,
            "propagation cycle complete"
        );
    }

    pub(crate) fn allocate_subscriber_id(&self) -> SubscriberId {
        self.inner.ids.next_subscriber()
    }

    pub(crate) fn with_providers<R>(&self, f: impl FnOnce(&ProviderSet) -> R) -> R {
        f(&self.inner.providers.lock())
    }

    pub(crate) fn with_providers_mut<R>(&self, f: impl FnOnce(&mut ProviderSet) -> R) -> R {
        f(&mut self.inner.providers.lock())
    }
}

impl Default for Broadcast {
    fn default() -> Self {
        let config = BroadcastConfig::default();
        let propagator = ChangePropagator::from_config(&config);
        Self::with_propagator(config, propagator)
    }
}

impl LifecycleEvents for Broadcast {
    fn provider_set_changed(&self) {
        self.refresh();
    }

    fn subscriber_mounted(&self, handle: SubscriberHandle) {
        self.inner.registry.lock().register(handle);
    }

    fn subscriber_updated(&self, handle: SubscriberHandle) {
        trace!(
            subscriber = %handle.id,
            requires = ?handle.requires,
            "subscriber requirements changed"
        );
        self.inner.registry.lock().register(handle);
    }

    fn subscriber_namespace_changed(
        &self,
        handle: &SubscriberHandle,
        old: &Namespace,
        new: &Namespace,
    ) -> SubscriberHandle {
        debug!(subscriber = %handle.id, from = %old, to = %new, "subscriber namespace changed");
        self.inner.registry.lock().rebind(handle, new.clone())
    }

    fn subscriber_unmounted(&self, handle: &SubscriberHandle) {
        self.inner
            .registry
            .lock()
            .deregister(&handle.namespace, handle.id);
    }
}

impl fmt::Debug for Broadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcast")
            .field("config", &self.inner.config)
            .field("providers", &self.provider_count())
            .finish_non_exhaustive()
    }
}

/// Releases the driver role if a cycle panics mid-drive
struct DriverGuard<'a> {
    broadcast: &'a Broadcast,
    armed: bool,
}

impl Drop for DriverGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut cycle = self.broadcast.inner.cycle.lock();
            cycle.running = false;
            cycle.driver = None;
            self.broadcast.inner.cycle_done.notify_all();
        }
    }
}
