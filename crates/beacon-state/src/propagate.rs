//! Change propagation - diff freshly reduced state against the store,
//! commit what changed and fan out to affected subscribers.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use beacon_core::{BroadcastConfig, ComparisonError, Namespace, RetentionPolicy};
use tracing::{debug, warn};

use crate::{
    ContextState, ContextStore, StateComparator, StructuralComparator, SubscriberHandle,
    SubscriberRegistry,
};

/// Observability hook for pipeline-internal failures
pub trait PropagationObserver: Send + Sync {
    fn on_comparison_error(&self, error: &ComparisonError);

    fn on_cycle(&self, _report: &PropagationReport) {}
}

/// Default observer: reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PropagationObserver for TracingObserver {
    fn on_comparison_error(&self, error: &ComparisonError) {
        warn!(
            namespace = %error.namespace(),
            %error,
            "comparison failed, treating namespace as changed"
        );
    }
}

/// Outcome of one diff-and-commit pass
#[derive(Debug, Default, Clone)]
pub struct PropagationReport {
    /// Namespaces compared (union of reduced and committed)
    pub examined: usize,
    /// Namespaces committed this cycle, sorted
    pub changed: Vec<Namespace>,
    /// Comparisons that failed; those namespaces are in `changed` too
    pub failures: Vec<ComparisonError>,
}

impl PropagationReport {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Diffs, commits and notifies
pub struct ChangePropagator {
    comparator: Box<dyn StateComparator>,
    observer: Arc<dyn PropagationObserver>,
    retention: RetentionPolicy,
}

impl ChangePropagator {
    pub fn new(comparator: Box<dyn StateComparator>, retention: RetentionPolicy) -> Self {
        Self {
            comparator,
            observer: Arc::new(TracingObserver),
            retention,
        }
    }

    pub fn from_config(config: &BroadcastConfig) -> Self {
        Self::new(
            Box::new(StructuralComparator::new(config.max_compare_depth)),
            config.retention,
        )
    }

    pub fn with_observer(mut self, observer: Arc<dyn PropagationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Compare every namespace in `next` or in the store and commit the
    /// ones that differ. A failed comparison counts as a change.
    pub fn diff_and_commit(
        &self,
        store: &mut ContextStore,
        mut next: ContextState,
    ) -> PropagationReport {
        let namespaces: BTreeSet<Namespace> =
            next.keys().chain(store.namespaces()).cloned().collect();

        let mut report = PropagationReport {
            examined: namespaces.len(),
            ..PropagationReport::default()
        };

        for namespace in namespaces {
            let incoming = next.remove(&namespace);
            if incoming.is_none() && self.retention == RetentionPolicy::Retain {
                continue;
            }

            let equal = match self
                .comparator
                .equal(&namespace, incoming.as_ref(), store.read(namespace.as_str()))
            {
                Ok(equal) => equal,
                Err(error) => {
                    self.observer.on_comparison_error(&error);
                    report.failures.push(error);
                    false
                }
            };

            if !equal {
                store.commit(namespace.clone(), incoming);
                report.changed.push(namespace);
            }
        }

        debug!(
            examined = report.examined,
            changed = report.changed.len(),
            failures = report.failures.len(),
            "diffed context state"
        );
        self.observer.on_cycle(&report);
        report
    }

    /// Subscribers to notify for a report, each at most once
    pub fn affected(
        &self,
        registry: &SubscriberRegistry,
        report: &PropagationReport,
    ) -> Vec<SubscriberHandle> {
        registry.handles_for(&report.changed)
    }

    /// Full single-owner cycle: diff, commit, then trigger affected
    /// subscribers. Returns the report and the number of triggers fired.
    pub fn propagate(
        &self,
        store: &mut ContextStore,
        registry: &SubscriberRegistry,
        next: ContextState,
    ) -> (PropagationReport, usize) {
        let report = self.diff_and_commit(store, next);
        let handles = self.affected(registry, &report);
        (report, fan_out(&handles))
    }
}

impl Default for ChangePropagator {
    fn default() -> Self {
        Self::from_config(&BroadcastConfig::default())
    }
}

impl std::fmt::Debug for ChangePropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePropagator")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

/// Trigger every handle once, synchronously.
///
/// A panicking trigger is logged and skipped so the remaining subscribers
/// of an already committed cycle are still notified. Returns the number of
/// triggers that completed.
pub fn fan_out(handles: &[SubscriberHandle]) -> usize {
    let mut completed = 0;
    for handle in handles {
        match panic::catch_unwind(AssertUnwindSafe(|| handle.trigger())) {
            Ok(()) => completed += 1,
            Err(_) => warn!(
                subscriber = %handle.id,
                namespace = %handle.namespace,
                "subscriber trigger panicked"
            ),
        }
    }
    debug!(triggered = completed, "notified subscribers");
    completed
}

/// Propagation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Completed cycles
    pub cycles: u64,
    pub namespaces_examined: u64,
    pub namespaces_changed: u64,
    pub triggers_fired: u64,
    pub comparison_failures: u64,
}

impl PropagationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &PropagationReport, triggered: usize) {
        self.cycles += 1;
        self.namespaces_examined += report.examined as u64;
        self.namespaces_changed += report.changed.len() as u64;
        self.triggers_fired += triggered as u64;
        self.comparison_failures += report.failures.len() as u64;
    }
}
