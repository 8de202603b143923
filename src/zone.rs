// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Binding the configured domain to a provider-managed zone.
//!
//! The binding is resolved once before watching begins and is read-only
//! afterwards.

use crate::errors::ZoneError;
use crate::provider::{DnsProvider, ManagedZone};
use std::fmt;
use tracing::info;

/// The configured domain bound to the provider zone that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneBinding {
    /// Configured base domain, without trailing dot
    pub domain: String,
    /// Provider-side zone identifier
    pub zone: String,
    /// DNS suffix of the bound zone
    pub dns_name: String,
}

impl fmt::Display for ZoneBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.domain, self.zone, self.dns_name)
    }
}

/// Pick the most specific zone whose DNS suffix covers `domain`.
///
/// A zone matches when `domain + "."` ends with its DNS name; among matches the
/// longest DNS name wins.
///
/// # Errors
///
/// Returns [`ZoneError::NoMatchingZone`] when no zone matches.
pub fn resolve_zone(domain: &str, zones: &[ManagedZone]) -> Result<ZoneBinding, ZoneError> {
    let domain = domain.trim_end_matches('.');
    let fqdn = format!("{domain}.");

    zones
        .iter()
        .filter(|zone| !zone.dns_name.is_empty() && fqdn.ends_with(zone.dns_name.as_str()))
        .filter(|zone| {
            // "notexample.com." must not match a zone for "example.com."
            let boundary = fqdn.len() - zone.dns_name.len();
            boundary == 0 || zone.dns_name.starts_with('.') || fqdn.as_bytes()[boundary - 1] == b'.'
        })
        .max_by_key(|zone| zone.dns_name.len())
        .map(|zone| ZoneBinding {
            domain: domain.to_string(),
            zone: zone.name.clone(),
            dns_name: zone.dns_name.clone(),
        })
        .ok_or_else(|| ZoneError::NoMatchingZone {
            domain: domain.to_string(),
        })
}

/// List the provider's zones and bind `domain` to the most specific one.
///
/// # Errors
///
/// Returns [`ZoneError::Provider`] if the zones cannot be listed, or
/// [`ZoneError::NoMatchingZone`] if none covers the domain.
pub async fn bind_zone(provider: &dyn DnsProvider, domain: &str) -> Result<ZoneBinding, ZoneError> {
    let zones = provider.list_managed_zones().await?;
    let binding = resolve_zone(domain, &zones)?;
    info!(
        domain = %binding.domain,
        zone = %binding.zone,
        dns_name = %binding.dns_name,
        candidates = zones.len(),
        "Bound domain to managed zone"
    );
    Ok(binding)
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
