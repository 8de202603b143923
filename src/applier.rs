// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Change applier.
//!
//! Submits a [`Change`] exactly once and then polls the provider on a fixed
//! interval until the change reports `done`. There is no timeout: a change that
//! never leaves `pending` keeps its caller waiting, so callers run each apply on
//! its own task. The poll sleep is a plain `tokio::time::sleep`; no lock is held
//! across it.
//!
//! A failed status poll ends the wait with [`ApplyOutcome::Unknown`]: the change
//! may or may not have landed, and the caller is expected to schedule a drift
//! check for the affected record.

use crate::errors::{ApplyError, ProviderError};
use crate::metrics;
use crate::provider::DnsProvider;
use crate::record::Change;
use crate::zone::ZoneBinding;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How a submitted change ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The provider reported the change as done
    Done {
        /// Provider change id
        id: String,
    },
    /// Polling failed; whether the change landed is not known
    Unknown {
        /// Provider change id
        id: String,
        /// The poll failure
        error: ProviderError,
    },
}

/// Submits changes to the bound zone and waits for them to finish.
#[derive(Clone)]
pub struct ChangeApplier {
    provider: Arc<dyn DnsProvider>,
    zone: ZoneBinding,
    poll_interval: Duration,
}

impl ChangeApplier {
    /// Create an applier for `zone`, polling every `poll_interval`.
    #[must_use]
    pub fn new(provider: Arc<dyn DnsProvider>, zone: ZoneBinding, poll_interval: Duration) -> Self {
        Self {
            provider,
            zone,
            poll_interval,
        }
    }

    /// The provider changes are submitted to.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn DnsProvider> {
        &self.provider
    }

    /// The zone changes are submitted to.
    #[must_use]
    pub fn zone(&self) -> &ZoneBinding {
        &self.zone
    }

    /// Submit `change` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::EmptyChange`] for a change with nothing in it, and
    /// [`ApplyError::SubmissionRejected`] when the provider refuses the submission.
    /// Submissions are never retried.
    pub async fn apply(&self, change: &Change) -> Result<ApplyOutcome, ApplyError> {
        if change.is_empty() {
            warn!("No add or delete provided, not going to update");
            return Err(ApplyError::EmptyChange);
        }

        let additions = change.addition_names();
        let deletions = change.deletion_names();
        let start = Instant::now();

        let mut descriptor = match self.provider.create_change(&self.zone.zone, change).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!(
                    zone = %self.zone.zone,
                    additions = %additions,
                    deletions = %deletions,
                    error = %e,
                    "Error creating change"
                );
                metrics::record_change_outcome("rejected", start.elapsed());
                return Err(ApplyError::SubmissionRejected(e));
            }
        };

        debug!(
            zone = %self.zone.zone,
            change_id = %descriptor.id,
            status = %descriptor.status,
            "Change submitted"
        );

        while !descriptor.status.is_done() {
            tokio::time::sleep(self.poll_interval).await;

            descriptor = match self.provider.get_change(&self.zone.zone, &descriptor.id).await {
                Ok(next) => next,
                Err(e) => {
                    warn!(
                        zone = %self.zone.zone,
                        change_id = %descriptor.id,
                        error = %e,
                        "Error while trying to get change status, outcome unknown"
                    );
                    metrics::record_change_outcome("unknown", start.elapsed());
                    return Ok(ApplyOutcome::Unknown {
                        id: descriptor.id,
                        error: e,
                    });
                }
            };

            debug!(
                change_id = %descriptor.id,
                status = %descriptor.status,
                "Polled change status"
            );
        }

        info!(
            zone = %self.zone.zone,
            change_id = %descriptor.id,
            additions = %additions,
            deletions = %deletions,
            elapsed = ?start.elapsed(),
            "Applied change"
        );
        metrics::record_change_outcome("done", start.elapsed());

        Ok(ApplyOutcome::Done { id: descriptor.id })
    }
}

#[cfg(test)]
#[path = "applier_tests.rs"]
mod applier_tests;
