// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS record types shared by the diff engine, applier and drift reconciler.
//!
//! - [`RecordKey`] - fully-qualified record name derived from a service
//! - [`AddressSet`] - order-independent address collection used for comparisons
//! - [`DesiredRecord`] - what a service's record should read
//! - [`ResourceRecordSet`] / [`Change`] - provider wire types

use crate::constants::RECORD_TYPE_A;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Fully-qualified record name `name.namespace.domain.`.
///
/// The trailing dot is significant: providers treat it as "fully qualified".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(String);

impl RecordKey {
    /// Derive the record name for a service under the given base domain.
    ///
    /// A trailing dot on `domain` is tolerated and never doubled.
    #[must_use]
    pub fn new(name: &str, namespace: &str, domain: &str) -> Self {
        let domain = domain.trim_end_matches('.');
        Self(format!("{name}.{namespace}.{domain}."))
    }

    /// The record name including the trailing dot.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order-independent set of address strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet(BTreeSet<String>);

impl AddressSet {
    /// Whether the set holds no addresses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<String> for AddressSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What the provider's record for a service should read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecord {
    /// Record name
    pub key: RecordKey,
    /// Addresses in reported order, duplicates removed
    pub addresses: Vec<String>,
    /// Time to live in seconds
    pub ttl: u32,
}

impl DesiredRecord {
    /// Build a desired record, dropping repeated addresses but keeping first-seen order.
    #[must_use]
    pub fn new(key: RecordKey, addresses: &[String], ttl: u32) -> Self {
        let mut seen = BTreeSet::new();
        let addresses = addresses
            .iter()
            .filter(|addr| seen.insert(addr.as_str()))
            .cloned()
            .collect();
        Self {
            key,
            addresses,
            ttl,
        }
    }

    /// The record type; always an address record.
    #[must_use]
    pub fn record_type(&self) -> &'static str {
        RECORD_TYPE_A
    }

    /// The addresses as an order-independent set.
    #[must_use]
    pub fn address_set(&self) -> AddressSet {
        self.addresses.iter().cloned().collect()
    }

    /// Convert into the provider wire representation.
    #[must_use]
    pub fn to_record_set(&self) -> ResourceRecordSet {
        ResourceRecordSet {
            name: self.key.as_str().to_string(),
            record_type: self.record_type().to_string(),
            ttl: self.ttl,
            rrdatas: self.addresses.clone(),
        }
    }

    /// Whether a provider record set reads exactly like this record.
    ///
    /// Compares name, type, TTL, and the address set (order-independent).
    #[must_use]
    pub fn matches(&self, actual: &ResourceRecordSet) -> bool {
        actual.name == self.key.as_str()
            && actual.record_type == self.record_type()
            && actual.ttl == self.ttl
            && actual.address_set() == self.address_set()
    }
}

/// A record set as the provider represents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecordSet {
    /// Fully-qualified record name
    pub name: String,
    /// Record type (e.g. `A`)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Time to live in seconds
    #[serde(default)]
    pub ttl: u32,
    /// Record data; IP address strings for `A` records
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

impl ResourceRecordSet {
    /// The record data as an order-independent set.
    #[must_use]
    pub fn address_set(&self) -> AddressSet {
        self.rrdatas.iter().cloned().collect()
    }
}

/// An atomic batch of deletions and additions submitted to the provider.
///
/// The provider applies deletions before additions, and every deletion must match
/// the record exactly as it currently exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// Record sets to create
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<ResourceRecordSet>,
    /// Record sets to remove
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<ResourceRecordSet>,
}

impl Change {
    /// Publish a new record.
    #[must_use]
    pub fn add(record: &DesiredRecord) -> Self {
        Self {
            additions: vec![record.to_record_set()],
            deletions: Vec::new(),
        }
    }

    /// Retract an existing record.
    #[must_use]
    pub fn delete(record: &DesiredRecord) -> Self {
        Self {
            additions: Vec::new(),
            deletions: vec![record.to_record_set()],
        }
    }

    /// Delete the old record and publish the new one in a single change.
    #[must_use]
    pub fn replace(old: &DesiredRecord, new: &DesiredRecord) -> Self {
        Self {
            additions: vec![new.to_record_set()],
            deletions: vec![old.to_record_set()],
        }
    }

    /// Whether there is nothing to submit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }

    /// Comma-separated names of the added record sets, for logging.
    #[must_use]
    pub fn addition_names(&self) -> String {
        join_names(&self.additions)
    }

    /// Comma-separated names of the deleted record sets, for logging.
    #[must_use]
    pub fn deletion_names(&self) -> String {
        join_names(&self.deletions)
    }
}

fn join_names(sets: &[ResourceRecordSet]) -> String {
    sets.iter()
        .map(|set| set.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod record_tests;
