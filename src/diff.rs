// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record diff engine.
//!
//! Maps an observed service transition to the DNS work it implies:
//!
//! | old addresses | new addresses | plan |
//! |---|---|---|
//! | empty | empty | [`Plan::Noop`] |
//! | empty | non-empty | add |
//! | non-empty | empty | delete |
//! | non-empty | same set | [`Plan::Reconcile`] |
//! | non-empty | different set | replace (delete old + add new in one change) |
//!
//! An add event behaves as empty → current; a delete event as the deleted
//! object's own addresses → empty. Set comparison ignores order.

use crate::record::{Change, DesiredRecord, RecordKey};
use crate::service::{ServiceEvent, ServiceObservation};

/// The DNS work implied by one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing is or should be published
    Noop,
    /// Submit a change
    Apply {
        /// The change to submit
        change: Change,
        /// The record that should exist once the change lands, if any
        desired: Option<DesiredRecord>,
    },
    /// The orchestrator saw no change; verify the provider still agrees
    Reconcile(DesiredRecord),
}

/// Turns service events into plans for one base domain.
#[derive(Debug, Clone)]
pub struct RecordPlanner {
    domain: String,
    ttl: u32,
}

impl RecordPlanner {
    /// Create a planner publishing under `domain` with the given TTL.
    #[must_use]
    pub fn new(domain: impl Into<String>, ttl: u32) -> Self {
        Self {
            domain: domain.into(),
            ttl,
        }
    }

    /// The record name for a service.
    #[must_use]
    pub fn key_for(&self, obs: &ServiceObservation) -> RecordKey {
        RecordKey::new(&obs.name, &obs.namespace, &self.domain)
    }

    /// The record a service observation should be published as, if any.
    #[must_use]
    pub fn desired_for(&self, obs: &ServiceObservation) -> Option<DesiredRecord> {
        obs.has_addresses()
            .then(|| DesiredRecord::new(self.key_for(obs), &obs.addresses, self.ttl))
    }

    /// Plan the work for a watch event.
    #[must_use]
    pub fn plan(&self, event: &ServiceEvent) -> Plan {
        match event {
            ServiceEvent::Added(current) => self.plan_transition(None, Some(current)),
            ServiceEvent::Updated { old, new } => self.plan_transition(Some(old), Some(new)),
            ServiceEvent::Deleted(deleted) => self.plan_transition(Some(deleted), None),
        }
    }

    /// Plan the work for a transition between two observations of one service.
    ///
    /// `None` stands for "no observation" (before an add, after a delete).
    #[must_use]
    pub fn plan_transition(
        &self,
        previous: Option<&ServiceObservation>,
        current: Option<&ServiceObservation>,
    ) -> Plan {
        let before = previous.and_then(|obs| self.desired_for(obs));
        let after = current.and_then(|obs| self.desired_for(obs));

        match (before, after) {
            (None, None) => Plan::Noop,
            (None, Some(new)) => Plan::Apply {
                change: Change::add(&new),
                desired: Some(new),
            },
            (Some(old), None) => Plan::Apply {
                change: Change::delete(&old),
                desired: None,
            },
            (Some(old), Some(new)) if old.address_set() == new.address_set() => {
                Plan::Reconcile(new)
            }
            (Some(old), Some(new)) => Plan::Apply {
                change: Change::replace(&old, &new),
                desired: Some(new),
            },
        }
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
