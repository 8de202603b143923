// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Drift reconciler.
//!
//! Compares what the provider actually holds for a record name against what the
//! cluster says it should hold, and submits a corrective change when they differ.
//!
//! Comparison is strict: address set (order-independent), TTL and record type
//! must all agree, and there must be exactly one record set. The correction
//! deletes the record sets exactly as the provider reported them, so its
//! deletion preconditions hold, and adds the desired record if there is one.

use crate::applier::{ApplyOutcome, ChangeApplier};
use crate::constants::RECORD_TYPE_A;
use crate::errors::DriftError;
use crate::metrics;
use crate::record::{Change, DesiredRecord, RecordKey, ResourceRecordSet};
use tracing::{debug, error, info};

/// Result of a drift check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftOutcome {
    /// The provider already matches the desired state
    InSync,
    /// The provider had drifted and a correction was applied
    Corrected(ApplyOutcome),
}

/// Compute the change that brings `actual` to `desired`, or `None` if they agree.
///
/// `desired == None` means no record should exist for `key`. Record sets in
/// `actual` for other names or types are ignored.
#[must_use]
pub fn correction(
    key: &RecordKey,
    desired: Option<&DesiredRecord>,
    actual: &[ResourceRecordSet],
) -> Option<Change> {
    let current: Vec<ResourceRecordSet> = actual
        .iter()
        .filter(|set| set.name == key.as_str() && set.record_type == RECORD_TYPE_A)
        .cloned()
        .collect();

    let in_sync = match desired {
        Some(record) => current.len() == 1 && record.matches(&current[0]),
        None => current.is_empty(),
    };
    if in_sync {
        return None;
    }

    Some(Change {
        additions: desired.map(DesiredRecord::to_record_set).into_iter().collect(),
        deletions: current,
    })
}

/// Checks a record against the provider and repairs it when it has drifted.
#[derive(Clone)]
pub struct DriftReconciler {
    applier: ChangeApplier,
}

impl DriftReconciler {
    /// Create a reconciler that corrects drift through `applier`.
    #[must_use]
    pub fn new(applier: ChangeApplier) -> Self {
        Self { applier }
    }

    /// Compare the provider's record for `key` with `desired` and correct it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::List`] when the current records cannot be read, and
    /// [`DriftError::Apply`] when the corrective change is refused.
    pub async fn reconcile(
        &self,
        key: &RecordKey,
        desired: Option<&DesiredRecord>,
    ) -> Result<DriftOutcome, DriftError> {
        let zone = &self.applier.zone().zone;
        let actual = match self
            .applier
            .provider()
            .list_records(zone, key.as_str(), RECORD_TYPE_A)
            .await
        {
            Ok(actual) => actual,
            Err(e) => {
                error!(record = %key, error = %e, "Failed to list records for drift check");
                metrics::record_drift_check("error");
                return Err(DriftError::List(e));
            }
        };

        let Some(change) = correction(key, desired, &actual) else {
            debug!(record = %key, "Provider record matches expected state");
            metrics::record_drift_check("in_sync");
            return Ok(DriftOutcome::InSync);
        };

        info!(
            record = %key,
            expected = ?desired.map(|d| &d.addresses),
            actual = ?actual.iter().map(|set| &set.rrdatas).collect::<Vec<_>>(),
            "Drift detected, correcting provider record"
        );
        metrics::record_drift_check("drifted");

        self.applier
            .apply(&change)
            .await
            .map(DriftOutcome::Corrected)
            .map_err(DriftError::Apply)
    }
}

#[cfg(test)]
#[path = "drift_tests.rs"]
mod drift_tests;
