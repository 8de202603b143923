// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS provider interface.
//!
//! The reconciliation engine talks to the DNS provider only through
//! [`DnsProvider`]. Two implementations ship with the crate:
//!
//! - [`cloud_dns::CloudDnsClient`] - Google Cloud DNS v1 REST API
//! - [`memory::MemoryDnsProvider`] - in-process zone with the same change
//!   preconditions, used by tests
//!
//! Providers never decide whether a change is needed, and change submission
//! and status reads are single-shot. Status polling and drift repair belong to
//! the [`applier`](crate::applier) and [`drift`](crate::drift) modules.

pub mod cloud_dns;
pub mod memory;

use crate::constants::{CHANGE_STATUS_DONE, CHANGE_STATUS_PENDING};
use crate::errors::ProviderError;
use crate::record::{Change, ResourceRecordSet};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A provider-managed zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZone {
    /// Provider-side zone identifier
    pub name: String,
    /// DNS suffix served by the zone, with trailing dot (e.g. `example.com.`)
    pub dns_name: String,
}

impl ManagedZone {
    /// Create a zone entry.
    #[must_use]
    pub fn new(name: impl Into<String>, dns_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dns_name: dns_name.into(),
        }
    }
}

/// Lifecycle status of a submitted change.
///
/// Any status other than `pending` or `done` is kept verbatim and treated as
/// non-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Accepted but not yet applied everywhere
    Pending,
    /// Fully applied
    Done,
    /// Unrecognized status string
    Other(String),
}

impl ChangeStatus {
    /// Parse a provider status string.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            CHANGE_STATUS_PENDING => Self::Pending,
            CHANGE_STATUS_DONE => Self::Done,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the change has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str(CHANGE_STATUS_PENDING),
            Self::Done => f.write_str(CHANGE_STATUS_DONE),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// Handle to a submitted change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDescriptor {
    /// Provider-assigned change id
    pub id: String,
    /// Status at the time of the call
    pub status: ChangeStatus,
}

/// Trait for DNS provider implementations.
///
/// # Thread Safety
///
/// Implementations are shared across per-record worker tasks through an `Arc`.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every zone managed in the configured project.
    async fn list_managed_zones(&self) -> Result<Vec<ManagedZone>, ProviderError>;

    /// Submit a change to a zone.
    ///
    /// Acceptance is asynchronous: the returned descriptor is usually `pending`.
    /// A refused submission returns [`ProviderError::Rejected`].
    async fn create_change(
        &self,
        zone: &str,
        change: &Change,
    ) -> Result<ChangeDescriptor, ProviderError>;

    /// Fetch the current status of a previously submitted change.
    async fn get_change(&self, zone: &str, id: &str) -> Result<ChangeDescriptor, ProviderError>;

    /// List the record sets with the given name and type.
    async fn list_records(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ResourceRecordSet>, ProviderError>;

    /// Provider name for logging (e.g. `cloud-dns`).
    fn provider_name(&self) -> &'static str;
}
