// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory DNS provider.
//!
//! Holds record sets in process and enforces the same change preconditions as
//! Cloud DNS:
//!
//! - every deletion must match an existing record set exactly (name, type, TTL
//!   and data), otherwise the whole change is rejected with HTTP 412
//! - an addition must not collide with a record set that survives the change's
//!   deletions, otherwise the whole change is rejected with HTTP 409
//!
//! Changes are applied atomically at submission and report `pending` for a
//! configurable number of status polls before turning `done`. Status polls can
//! be made to fail on demand to exercise unknown-outcome handling; a failed poll
//! ends the caller's wait, so that change stops counting towards overlaps.

use super::{ChangeDescriptor, ChangeStatus, DnsProvider, ManagedZone};
use crate::errors::ProviderError;
use crate::record::{Change, ResourceRecordSet};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Record sets are unique per (name, type).
type RecordSetKey = (String, String);

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<RecordSetKey, ResourceRecordSet>,
    /// Remaining `pending` polls per change id
    changes: HashMap<String, usize>,
    /// Names touched by each change whose caller is still waiting for `done`
    in_flight: HashMap<String, Vec<String>>,
    submitted: Vec<Change>,
    next_change_id: u64,
    pending_polls: usize,
    failing_polls: usize,
    overlapping_submissions: usize,
}

/// DNS provider backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryDnsProvider {
    zones: Vec<ManagedZone>,
    state: Mutex<MemoryState>,
}

impl MemoryDnsProvider {
    /// Create a provider serving the given zones.
    #[must_use]
    pub fn new(zones: Vec<ManagedZone>) -> Self {
        Self {
            zones,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of `pending` answers each change gives before reporting `done`.
    #[must_use]
    pub fn with_pending_polls(self, polls: usize) -> Self {
        self.lock().pending_polls = polls;
        self
    }

    /// Make the next `count` status polls fail with a transient error.
    pub fn fail_next_polls(&self, count: usize) {
        self.lock().failing_polls = count;
    }

    /// Insert a record set directly, bypassing change preconditions.
    pub fn seed_record(&self, record: ResourceRecordSet) {
        self.lock().records.insert(
            (record.name.clone(), record.record_type.clone()),
            record,
        );
    }

    /// Remove a record set directly, bypassing change preconditions.
    pub fn remove_record(&self, name: &str, record_type: &str) -> Option<ResourceRecordSet> {
        self.lock()
            .records
            .remove(&(name.to_string(), record_type.to_string()))
    }

    /// Current record set for a name and type.
    #[must_use]
    pub fn record(&self, name: &str, record_type: &str) -> Option<ResourceRecordSet> {
        self.lock()
            .records
            .get(&(name.to_string(), record_type.to_string()))
            .cloned()
    }

    /// Every record set currently held.
    #[must_use]
    pub fn records(&self) -> Vec<ResourceRecordSet> {
        self.lock().records.values().cloned().collect()
    }

    /// Every change accepted so far, in submission order.
    #[must_use]
    pub fn submitted_changes(&self) -> Vec<Change> {
        self.lock().submitted.clone()
    }

    /// How many submissions touched a name that still had an unfinished change.
    #[must_use]
    pub fn overlapping_submissions(&self) -> usize {
        self.lock().overlapping_submissions
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test thread panicked mid-update; the map is still usable.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_zone(&self, zone: &str) -> Result<(), ProviderError> {
        if self.zones.iter().any(|z| z.name == zone) {
            Ok(())
        } else {
            Err(ProviderError::Rejected {
                status: 404,
                message: format!("The 'parameters.managedZone' resource named '{zone}' does not exist."),
            })
        }
    }
}

fn record_set_key(set: &ResourceRecordSet) -> RecordSetKey {
    (set.name.clone(), set.record_type.clone())
}

fn same_record_set(a: &ResourceRecordSet, b: &ResourceRecordSet) -> bool {
    a.name == b.name
        && a.record_type == b.record_type
        && a.ttl == b.ttl
        && a.address_set() == b.address_set()
}

#[async_trait]
impl DnsProvider for MemoryDnsProvider {
    async fn list_managed_zones(&self) -> Result<Vec<ManagedZone>, ProviderError> {
        Ok(self.zones.clone())
    }

    async fn create_change(
        &self,
        zone: &str,
        change: &Change,
    ) -> Result<ChangeDescriptor, ProviderError> {
        self.check_zone(zone)?;
        let mut state = self.lock();
        let mut records = state.records.clone();

        for deletion in &change.deletions {
            match records.get(&record_set_key(deletion)) {
                Some(existing) if same_record_set(existing, deletion) => {
                    records.remove(&record_set_key(deletion));
                }
                _ => {
                    return Err(ProviderError::Rejected {
                        status: 412,
                        message: format!(
                            "The resource 'entity.change.deletions[{}]' does not match the existing record set",
                            deletion.name
                        ),
                    });
                }
            }
        }

        for addition in &change.additions {
            if records.contains_key(&record_set_key(addition)) {
                return Err(ProviderError::Rejected {
                    status: 409,
                    message: format!(
                        "The resource 'entity.change.additions[{}]' named '{} ({})' already exists",
                        addition.name, addition.name, addition.record_type
                    ),
                });
            }
            records.insert(record_set_key(addition), addition.clone());
        }

        let names: Vec<String> = change
            .deletions
            .iter()
            .chain(&change.additions)
            .map(|set| set.name.clone())
            .collect();
        let overlaps = state
            .in_flight
            .values()
            .any(|busy| busy.iter().any(|name| names.contains(name)));
        if overlaps {
            state.overlapping_submissions += 1;
        }

        state.next_change_id += 1;
        let id = state.next_change_id.to_string();
        let pending_polls = state.pending_polls;
        state.records = records;
        state.changes.insert(id.clone(), pending_polls);
        state.in_flight.insert(id.clone(), names);
        state.submitted.push(change.clone());

        Ok(ChangeDescriptor {
            id,
            status: ChangeStatus::Pending,
        })
    }

    async fn get_change(&self, zone: &str, id: &str) -> Result<ChangeDescriptor, ProviderError> {
        self.check_zone(zone)?;
        let mut state = self.lock();

        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            // The caller gives up on this change, so it no longer counts as in flight.
            state.in_flight.remove(id);
            return Err(ProviderError::Unavailable {
                status: 503,
                message: "backendError".to_string(),
            });
        }

        let Some(remaining) = state.changes.get_mut(id) else {
            return Err(ProviderError::Rejected {
                status: 404,
                message: format!("The 'parameters.changeId' resource named '{id}' does not exist."),
            });
        };

        let status = if *remaining == 0 {
            ChangeStatus::Done
        } else {
            *remaining -= 1;
            ChangeStatus::Pending
        };
        if status.is_done() {
            state.in_flight.remove(id);
        }

        Ok(ChangeDescriptor {
            id: id.to_string(),
            status,
        })
    }

    async fn list_records(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ResourceRecordSet>, ProviderError> {
        self.check_zone(zone)?;
        Ok(self
            .lock()
            .records
            .get(&(name.to_string(), record_type.to_string()))
            .cloned()
            .into_iter()
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
