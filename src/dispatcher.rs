// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event dispatcher.
//!
//! Receives decoded [`ServiceEvent`]s, filters ineligible services, plans the DNS
//! work for each event and hands it to a per-record worker.
//!
//! # Per-record serialization
//!
//! Every [`RecordKey`] has at most one worker task. A worker runs its jobs strictly
//! in arrival order, so two changes for the same record never overlap at the
//! provider, while workers for different records run concurrently. A worker exits
//! once its queue is empty; the next event for that record starts a fresh one.
//!
//! The worker map is guarded by a plain mutex that is only held to look up or
//! remove a sender, never across an apply.
//!
//! A record's queue holds at most one consistency check that has not started.
//! While the worker is blocked on a slow change, repeated resyncs and no-op
//! updates collapse into that one check instead of piling up behind it.
//!
//! # Unknown outcomes
//!
//! When a status poll fails the worker waits `recheck_delay` and then runs the
//! drift reconciler against the latest desired state it knows for the record,
//! so the change's real outcome is verified instead of forgotten.

use crate::applier::{ApplyOutcome, ChangeApplier};
use crate::diff::{Plan, RecordPlanner};
use crate::drift::{DriftOutcome, DriftReconciler};
use crate::errors::Ineligible;
use crate::metrics;
use crate::record::{Change, DesiredRecord, RecordKey};
use crate::service::{check_eligibility, ServiceEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

/// Work queued for one record.
#[derive(Debug, Clone)]
enum Job {
    /// Submit a change; `desired` is the record expected afterwards
    Apply {
        change: Change,
        desired: Option<DesiredRecord>,
    },
    /// Verify the provider against `desired`
    Reconcile(Option<DesiredRecord>),
}

/// What the dispatcher did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The service may not be published
    Ineligible(Ineligible),
    /// Nothing to publish or retract
    Noop,
    /// Work was queued for the record
    Queued(RecordKey),
    /// A consistency check for the record is already waiting in its queue
    AlreadyQueued(RecordKey),
}

/// Queue handle of a running worker.
struct WorkerSlot {
    sender: UnboundedSender<Job>,
    /// A `Job::Reconcile` is queued and not yet picked up
    reconcile_queued: bool,
}

struct Shared {
    planner: RecordPlanner,
    applier: ChangeApplier,
    reconciler: DriftReconciler,
    recheck_delay: Duration,
    workers: Mutex<HashMap<RecordKey, WorkerSlot>>,
}

impl Shared {
    fn workers(&self) -> MutexGuard<'_, HashMap<RecordKey, WorkerSlot>> {
        // The map stays consistent even if a holder panicked; keep dispatching.
        self.workers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Routes service events to per-record workers.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// `recheck_delay` is how long a worker waits after a failed status poll
    /// before verifying the record against the provider.
    #[must_use]
    pub fn new(planner: RecordPlanner, applier: ChangeApplier, recheck_delay: Duration) -> Self {
        let reconciler = DriftReconciler::new(applier.clone());
        Self {
            shared: Arc::new(Shared {
                planner,
                applier,
                reconciler,
                recheck_delay,
                workers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Handle one watch event without waiting for any provider call.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, event: &ServiceEvent) -> DispatchOutcome {
        let subject = event.subject();

        if let Err(reason) = check_eligibility(&subject.name, &subject.namespace) {
            info!("{reason}");
            metrics::record_event(event.kind(), "ineligible");
            return DispatchOutcome::Ineligible(reason);
        }

        let key = self.shared.planner.key_for(subject);
        let job = match self.shared.planner.plan(event) {
            Plan::Noop => {
                debug!(record = %key, event = event.kind(), "No addresses to publish or retract");
                metrics::record_event(event.kind(), "noop");
                return DispatchOutcome::Noop;
            }
            Plan::Apply { change, desired } => {
                info!(
                    record = %key,
                    event = event.kind(),
                    additions = change.additions.len(),
                    deletions = change.deletions.len(),
                    "Got possible service change"
                );
                metrics::record_event(event.kind(), "apply");
                Job::Apply { change, desired }
            }
            Plan::Reconcile(desired) => {
                debug!(
                    record = %key,
                    addresses = ?desired.addresses,
                    "Old and new service have the same addresses, checking provider"
                );
                metrics::record_event(event.kind(), "reconcile");
                Job::Reconcile(Some(desired))
            }
        };

        self.enqueue(key, job)
    }

    /// Number of records that currently have a running worker.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.shared.workers().len()
    }

    /// Wait until every worker has drained its queue.
    pub async fn wait_idle(&self) {
        while self.active_workers() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn enqueue(&self, key: RecordKey, job: Job) -> DispatchOutcome {
        let is_reconcile = matches!(job, Job::Reconcile(_));
        let mut workers = self.shared.workers();

        let job = match workers.get_mut(&key) {
            Some(slot) if is_reconcile && slot.reconcile_queued => {
                debug!(record = %key, "Consistency check already queued");
                return DispatchOutcome::AlreadyQueued(key);
            }
            Some(slot) => match slot.sender.send(job) {
                Ok(()) => {
                    // Only a check queued after the latest change is still useful.
                    slot.reconcile_queued = is_reconcile;
                    return DispatchOutcome::Queued(key);
                }
                // Worker is gone without deregistering; start a new one below
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Cannot fail: rx is still alive.
        let _ = tx.send(job);
        workers.insert(
            key.clone(),
            WorkerSlot {
                sender: tx,
                reconcile_queued: is_reconcile,
            },
        );
        drop(workers);

        debug!(record = %key, "Starting record worker");
        tokio::spawn(run_worker(self.shared.clone(), key.clone(), rx));
        DispatchOutcome::Queued(key)
    }
}

/// Process jobs for one record until its queue is empty.
async fn run_worker(shared: Arc<Shared>, key: RecordKey, mut rx: UnboundedReceiver<Job>) {
    let mut desired: Option<DesiredRecord> = None;

    loop {
        let job = match rx.try_recv() {
            Ok(job) => job,
            Err(TryRecvError::Empty) => {
                // Deregister under the lock so no sender can slip a job in after the check.
                let mut workers = shared.workers();
                match rx.try_recv() {
                    Ok(job) => job,
                    Err(_) => {
                        workers.remove(&key);
                        debug!(record = %key, "Record worker idle, exiting");
                        return;
                    }
                }
            }
            Err(TryRecvError::Disconnected) => return,
        };

        match job {
            Job::Apply {
                change,
                desired: next,
            } => {
                desired = next;
                apply_change(&shared, &key, &change, desired.as_ref()).await;
            }
            Job::Reconcile(next) => {
                {
                    // Anything queued after a check either clears the flag or is refused,
                    // so with a non-empty queue the flag belongs to a later check.
                    let mut workers = shared.workers();
                    if let Some(slot) = workers.get_mut(&key) {
                        if rx.is_empty() {
                            slot.reconcile_queued = false;
                        }
                    }
                }
                desired = next;
                if !rx.is_empty() {
                    debug!(record = %key, "Newer work queued, skipping consistency check");
                    continue;
                }
                reconcile(&shared, &key, desired.as_ref()).await;
            }
        }
    }
}

async fn apply_change(
    shared: &Shared,
    key: &RecordKey,
    change: &Change,
    desired: Option<&DesiredRecord>,
) {
    match shared.applier.apply(change).await {
        Ok(ApplyOutcome::Done { .. }) => {}
        Ok(ApplyOutcome::Unknown { id, error }) => {
            warn!(
                record = %key,
                change_id = %id,
                error = %error,
                recheck_in = ?shared.recheck_delay,
                "Change outcome unknown, scheduling drift check"
            );
            tokio::time::sleep(shared.recheck_delay).await;
            reconcile(shared, key, desired).await;
        }
        Err(e) => {
            error!(record = %key, error = %e, "Dropping change");
        }
    }
}

async fn reconcile(shared: &Shared, key: &RecordKey, desired: Option<&DesiredRecord>) {
    match shared.reconciler.reconcile(key, desired).await {
        Ok(DriftOutcome::InSync) => {}
        Ok(DriftOutcome::Corrected(ApplyOutcome::Done { .. })) => {
            info!(record = %key, "Corrected drifted record");
        }
        Ok(DriftOutcome::Corrected(ApplyOutcome::Unknown { id, error })) => {
            // Left for the next resync to verify.
            warn!(
                record = %key,
                change_id = %id,
                error = %error,
                "Correction outcome unknown"
            );
        }
        Err(e) => {
            error!(record = %key, error = %e, "Drift check failed");
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod dispatcher_tests;
