// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service observations and the policies applied to them before publication.
//!
//! - [`external_addresses`] extracts load-balancer ingress IPs from a `Service`
//! - [`check_eligibility`] decides whether a service may be published at all
//! - [`ServiceEvent`] is the closed set of watch notifications the rest of the
//!   crate consumes, decoded once at the watch boundary

use crate::constants::RESERVED_NAMESPACE;
use crate::errors::Ineligible;
use crate::record::AddressSet;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use std::net::Ipv4Addr;
use tracing::debug;

/// Immutable snapshot of a watched service at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceObservation {
    /// Service name
    pub name: String,
    /// Service namespace
    pub namespace: String,
    /// External addresses in the order the load balancer reported them
    pub addresses: Vec<String>,
}

impl ServiceObservation {
    /// Create an observation from its parts.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        addresses: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            addresses,
        }
    }

    /// Build an observation from a Kubernetes `Service` object.
    #[must_use]
    pub fn from_service(service: &Service) -> Self {
        Self {
            name: service.name_any(),
            namespace: service.namespace().unwrap_or_default(),
            addresses: external_addresses(service),
        }
    }

    /// The external addresses as an order-independent set.
    #[must_use]
    pub fn address_set(&self) -> AddressSet {
        AddressSet::from_iter(self.addresses.iter().cloned())
    }

    /// Whether the load balancer has assigned any address yet.
    #[must_use]
    pub fn has_addresses(&self) -> bool {
        !self.addresses.is_empty()
    }
}

/// A watch notification, decoded once at the watch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// A service appeared
    Added(ServiceObservation),
    /// A service changed (or was re-delivered by a resync)
    Updated {
        /// The previously observed state
        old: ServiceObservation,
        /// The newly observed state
        new: ServiceObservation,
    },
    /// A service was removed
    Deleted(ServiceObservation),
}

impl ServiceEvent {
    /// The observation that identifies the service this event concerns.
    #[must_use]
    pub fn subject(&self) -> &ServiceObservation {
        match self {
            Self::Added(obs) | Self::Deleted(obs) | Self::Updated { new: obs, .. } => obs,
        }
    }

    /// Short lowercase label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "add",
            Self::Updated { .. } => "update",
            Self::Deleted(_) => "delete",
        }
    }
}

/// Extract the external load-balancer IPv4 addresses from a service's status.
///
/// Preserves the order the provider reported. Only IPv4 addresses can go into an
/// `A` record: hostname-only ingress points, IPv6 addresses (dual-stack services)
/// and unparseable values are skipped. A missing status or ingress list yields an
/// empty vector.
#[must_use]
pub fn external_addresses(service: &Service) -> Vec<String> {
    let Some(ingress) = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
    else {
        return Vec::new();
    };

    ingress
        .iter()
        .filter_map(|point| point.ip.as_deref())
        .filter(|ip| !ip.is_empty())
        .filter_map(|ip| match ip.parse::<Ipv4Addr>() {
            Ok(addr) => Some(addr.to_string()),
            Err(_) => {
                debug!(
                    service = %service.name_any(),
                    address = ip,
                    "Skipping ingress address that cannot be published as an A record"
                );
                None
            }
        })
        .collect()
}

/// Decide whether a service may be published.
///
/// # Errors
///
/// Returns the [`Ineligible`] reason when the service lives in the reserved
/// namespace or its name contains a `.`.
pub fn check_eligibility(name: &str, namespace: &str) -> Result<(), Ineligible> {
    if namespace == RESERVED_NAMESPACE {
        return Err(Ineligible::ReservedNamespace {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
    }

    if name.contains('.') {
        return Err(Ineligible::DottedName {
            name: name.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
