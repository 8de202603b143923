// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # kube-gce-dns - publish Kubernetes services to Google Cloud DNS
//!
//! Watches `Service` objects cluster-wide and keeps one A record per service,
//! `<service>.<namespace>.<domain>.`, in sync with the service's external
//! load-balancer addresses in a Cloud DNS managed zone.
//!
//! ## Overview
//!
//! Every watch notification flows through the same pipeline:
//!
//! 1. [`watch`] decodes the watcher stream into [`service::ServiceEvent`]s
//! 2. [`service`] drops services in `kube-system` or with dotted names
//! 3. [`diff`] turns the old and new address sets into a [`diff::Plan`]
//! 4. [`dispatcher`] queues the plan on the record's own worker
//! 5. [`applier`] submits the change and polls it until `done`
//! 6. [`drift`] compares the provider's record with the expected one and repairs it
//!
//! The managed zone is resolved once at startup by [`zone`].
//!
//! ## Modules
//!
//! - [`config`] - Command-line and environment configuration
//! - [`provider`] - The [`provider::DnsProvider`] trait, the Cloud DNS client and an in-memory provider
//! - [`auth`] - OAuth access tokens for the Cloud DNS API
//! - [`retry`] - Exponential backoff for provider reads
//! - [`record`] - Record names, address sets and change batches
//! - [`metrics`] - Prometheus metrics and the `/metrics` endpoint
//!
//! ## Example
//!
//! ```rust
//! use kube_gce_dns::diff::{Plan, RecordPlanner};
//! use kube_gce_dns::service::{ServiceEvent, ServiceObservation};
//!
//! let planner = RecordPlanner::new("example.com", 300);
//! let web = ServiceObservation::new("web", "prod", vec!["10.0.0.1".to_string()]);
//!
//! match planner.plan(&ServiceEvent::Added(web)) {
//!     Plan::Apply { change, .. } => {
//!         assert_eq!(change.additions[0].name, "web.prod.example.com.");
//!     }
//!     other => panic!("unexpected plan: {other:?}"),
//! }
//! ```

pub mod applier;
pub mod auth;
pub mod config;
pub mod constants;
pub mod diff;
pub mod dispatcher;
pub mod drift;
pub mod errors;
pub mod metrics;
pub mod provider;
pub mod record;
pub mod retry;
pub mod service;
pub mod watch;
pub mod zone;
